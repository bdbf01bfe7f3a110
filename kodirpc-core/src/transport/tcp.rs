//! # TCP Transport
//!
//! Raw JSON-RPC over TCP: envelopes are written back to back, without delimiters, so inbound
//! bytes are fed through an incremental JSON parser until a full value is available.
//!
//! Each request opens its own connection. The service also pushes notifications on TCP
//! connections; those, and responses to other ids, are skipped while waiting.
use super::jsonrpc::{self, Inbound, JsonRpcResponse};
use super::{Transport, TransportError};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

/// A one-shot transport over a raw TCP socket.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    /// Creates a transport connecting to `addr` (e.g. `localhost:9090`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for TcpTransport {
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        id: Option<String>,
    ) -> Result<JsonRpcResponse, TransportError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let body = jsonrpc::encode_request(method, params.as_ref(), &id)?;

        let mut stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|source| TransportError::Connect {
                    url: self.addr.clone(),
                    source: source.into(),
                })?;

        debug!(addr = %self.addr, method, %id, "sending tcp request");
        stream.write_all(body.as_bytes()).await?;

        let mut reader = ValueReader::new(stream);

        loop {
            let value = reader
                .next_value()
                .await?
                .ok_or(TransportError::ConnectionClosed)?;

            let inbound = jsonrpc::decode_value(value)
                .map_err(|err| TransportError::Decode(err.to_string()))?;

            match inbound {
                Inbound::Notification(notification) => {
                    debug!(method = %notification.method, "skipping notification");
                }
                Inbound::Response(frame) if frame.id.as_deref().is_some_and(|r| r != id) => {
                    debug!(received = ?frame.id, expected = %id, "skipping response for another request");
                }
                Inbound::Response(frame) => return frame.into_response(&id),
            }
        }
    }
}

/// Splits a byte stream of concatenated JSON values.
struct ValueReader<R> {
    source: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> ValueReader<R> {
    fn new(source: R) -> Self {
        Self {
            source,
            buffer: Vec::new(),
        }
    }

    /// Returns the next complete value, or `None` once the stream ends.
    async fn next_value(&mut self) -> Result<Option<Value>, TransportError> {
        loop {
            let parsed = {
                let mut values =
                    serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();
                match values.next() {
                    Some(Ok(value)) => Some(Ok((value, values.byte_offset()))),
                    Some(Err(err)) if err.is_eof() => None,
                    Some(Err(err)) => Some(Err(err)),
                    None => None,
                }
            };

            match parsed {
                Some(Ok((value, consumed))) => {
                    self.buffer.drain(..consumed);
                    return Ok(Some(value));
                }
                Some(Err(err)) => return Err(TransportError::Decode(err.to_string())),
                None => {}
            }

            if self.source.read_buf(&mut self.buffer).await? == 0 {
                return Ok(None);
            }
        }
    }
}
