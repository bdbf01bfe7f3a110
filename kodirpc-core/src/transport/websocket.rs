//! # WebSocket Transport
//!
//! The persistent-connection transport.
//!
//! ## Connection lifecycle
//!
//! The connection is opened lazily by the first [`request`](Transport::request), or explicitly
//! with [`connect`](Transport::connect). With `close_on_request` enabled (the default), every
//! request closes the connection once its response arrives: one logical request per physical
//! connection. With it disabled the connection stays open until
//! [`disconnect`](Transport::disconnect).
//!
//! ## Correlation
//!
//! Requests are single-flight: callers serialize calls on an instance (`request` takes
//! `&mut self`), so a single [`CorrelationState`] slot tracks the id in flight. Responses that
//! carry another id are stale and dropped; a response without an id is attributed to the last
//! issued id.
//!
//! ## Inbound frames
//!
//! A reader task owns the receiving half of the socket. Its per-frame handler is wrapped so that
//! a frame which is not valid JSON-RPC is reported as a [`MalformedFrameError`] on the
//! error-response channel instead of tearing the connection down or starving the pending call.
//! Notifications are published on their own channel.
use super::correlation::CorrelationState;
use super::jsonrpc::{self, Inbound, JsonRpcResponse, Notification, ResponseFrame};
use super::{Transport, TransportError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect` waits for the service to acknowledge the close handshake.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

const CHANNEL_CAPACITY: usize = 64;

/// An inbound frame that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed frame ({reason}): {frame}")]
pub struct MalformedFrameError {
    /// The raw frame, lossily decoded as UTF-8.
    pub frame: String,
    pub reason: String,
}

/// The side channels inbound frames that are not responses end up on.
///
/// Cloning shares the channels, so subscribers can be attached without access to the transport.
#[derive(Debug, Clone)]
pub struct FrameChannels {
    errors: broadcast::Sender<MalformedFrameError>,
    notifications: broadcast::Sender<Notification>,
}

impl Default for FrameChannels {
    fn default() -> Self {
        let (errors, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            errors,
            notifications,
        }
    }
}

impl FrameChannels {
    /// Subscribes to malformed inbound frames.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<MalformedFrameError> {
        self.errors.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Notifications as a stream. Lagged subscribers see a `Lagged` error item.
    pub fn notification_stream(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.notifications.subscribe())
    }
}

/// A JSON-RPC transport over a persistent WebSocket connection.
pub struct WebSocketTransport {
    url: String,
    close_on_request: bool,
    correlation: CorrelationState,
    connection: Option<Connection>,
    channels: FrameChannels,
}

struct Connection {
    sink: SplitSink<WsStream, Message>,
    responses: mpsc::UnboundedReceiver<ResponseFrame>,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl WebSocketTransport {
    /// Creates a disconnected transport for `url` (e.g. `ws://localhost:9090/jsonrpc`).
    ///
    /// # Arguments
    ///
    /// * `close_on_request` - Close the connection after every response.
    pub fn new(url: impl Into<String>, close_on_request: bool) -> Self {
        Self {
            url: url.into(),
            close_on_request,
            correlation: CorrelationState::default(),
            connection: None,
            channels: FrameChannels::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn close_on_request(&self) -> bool {
        self.close_on_request
    }

    /// Whether a connection is open and its reader is still running.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| !connection.reader.is_finished())
    }

    /// The error-response and notification channels of this transport.
    pub fn channels(&self) -> &FrameChannels {
        &self.channels
    }

    async fn exchange(
        &mut self,
        id: &str,
        method: &str,
        params: Option<&Value>,
    ) -> Result<ResponseFrame, TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;

        let body = jsonrpc::encode_request(method, params, id)?;
        connection.sink.send(Message::text(body)).await?;

        loop {
            let frame = connection
                .responses
                .recv()
                .await
                .ok_or(TransportError::ConnectionClosed)?;

            match frame.id.as_deref() {
                Some(received) if received != id => {
                    warn!(received, expected = id, "discarding response for another request");
                }
                _ => return Ok(frame),
            }
        }
    }
}

impl Transport for WebSocketTransport {
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        id: Option<String>,
    ) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_connected() {
            self.connect(None).await?;
        }

        if let Some(id) = id {
            self.correlation.stage(id);
        }
        let id = self.correlation.issue();

        debug!(method, %id, "sending websocket request");
        let outcome = self.exchange(&id, method, params.as_ref()).await;

        if self.close_on_request {
            self.disconnect().await;
        }

        let fallback = self.correlation.last().unwrap_or(&id).to_string();
        outcome?.into_response(&fallback)
    }

    async fn connect(&mut self, url: Option<&str>) -> Result<(), TransportError> {
        if self.connection.is_some() {
            self.disconnect().await;
        }

        let url = url.unwrap_or(&self.url).to_string();

        let (stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|source| TransportError::Connect {
                    url: url.clone(),
                    source: source.into(),
                })?;

        let (sink, source) = stream.split();
        let (responses_tx, responses) = mpsc::unbounded_channel();

        let handler = FrameHandler {
            responses: responses_tx,
            channels: self.channels.clone(),
        };

        let reader = tokio::spawn(read_frames(source, handler));

        self.connection = Some(Connection {
            sink,
            responses,
            reader,
        });

        debug!(%url, "websocket connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        if let Err(err) = connection.sink.close().await {
            debug!(%err, "websocket close handshake could not be sent");
        }

        match tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut connection.reader).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(%err, "websocket reader ended abnormally"),
            Err(_) => debug!("websocket reader did not finish in time, aborting it"),
        }

        debug!(url = %self.url, "websocket disconnected");
    }
}

/// Routes decoded inbound frames to whoever is interested in them.
struct FrameHandler {
    responses: mpsc::UnboundedSender<ResponseFrame>,
    channels: FrameChannels,
}

impl FrameHandler {
    /// Handles one text frame; failures go to the error-response channel.
    fn handle(&self, text: &str) {
        if let Err(err) = self.dispatch(text) {
            self.report(err);
        }
    }

    fn dispatch(&self, text: &str) -> Result<(), MalformedFrameError> {
        let inbound = jsonrpc::decode_frame(text).map_err(|err| MalformedFrameError {
            frame: text.to_string(),
            reason: err.to_string(),
        })?;

        match inbound {
            Inbound::Response(frame) => {
                if self.responses.send(frame).is_err() {
                    debug!("response arrived with nobody waiting for it");
                }
            }
            Inbound::Notification(notification) => {
                debug!(method = %notification.method, "notification received");
                // Nobody subscribed is not an error.
                let _ = self.channels.notifications.send(notification);
            }
        }

        Ok(())
    }

    fn report(&self, err: MalformedFrameError) {
        warn!(reason = %err.reason, "malformed frame received");
        let _ = self.channels.errors.send(err);
    }
}

async fn read_frames(mut source: SplitStream<WsStream>, handler: FrameHandler) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => handler.handle(text.as_str()),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handler.handle(text),
                Err(err) => handler.report(MalformedFrameError {
                    frame: String::from_utf8_lossy(&data).into_owned(),
                    reason: err.to_string(),
                }),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%err, "websocket read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler() -> (
        FrameHandler,
        mpsc::UnboundedReceiver<ResponseFrame>,
        broadcast::Receiver<MalformedFrameError>,
        broadcast::Receiver<Notification>,
    ) {
        let (responses, responses_rx) = mpsc::unbounded_channel();
        let channels = FrameChannels::default();
        let errors = channels.subscribe_errors();
        let notifications = channels.subscribe_notifications();

        (
            FrameHandler {
                responses,
                channels,
            },
            responses_rx,
            errors,
            notifications,
        )
    }

    #[test]
    fn malformed_frames_go_to_the_error_channel() {
        let (handler, mut responses, mut errors, _notifications) = handler();

        handler.handle("{not json");
        handler.handle(r#"{"id": "1", "jsonrpc": "2.0", "result": "pong"}"#);

        let err = errors.try_recv().unwrap();
        assert_eq!(err.frame, "{not json");
        assert!(errors.try_recv().is_err());

        let frame = responses.try_recv().unwrap();
        assert_eq!(frame.id.as_deref(), Some("1"));
        assert_eq!(frame.outcome, Ok(json!("pong")));
    }

    #[test]
    fn notifications_go_to_the_notification_channel() {
        let (handler, mut responses, _errors, mut notifications) = handler();

        handler.handle(r#"{"jsonrpc": "2.0", "method": "System.OnQuit", "params": {"data": null}}"#);

        assert_eq!(notifications.try_recv().unwrap().method, "System.OnQuit");
        assert!(responses.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_without_connection_completes() {
        let mut transport = WebSocketTransport::new("ws://127.0.0.1:1/jsonrpc", false);

        transport.disconnect().await;
        transport.disconnect().await;

        assert!(!transport.is_connected());
    }
}
