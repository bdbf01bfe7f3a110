//! # JSON-RPC Transports
//!
//! This module contains the building blocks that move JSON-RPC envelopes between the client and
//! the service.
//!
//! Every transport implements [`Transport`]: send one request, get back its
//! [`JsonRpcResponse`]. One-shot transports ([`http`], [`tcp`]) treat `connect`/`disconnect` as
//! no-ops; the persistent [`websocket`] transport owns a connection lifecycle and correlates
//! responses on it.
//!
//! [`AnyTransport`] is the closed set of transports a [`KodiClient`](crate::client::KodiClient)
//! can be built with from [`ClientOptions`](crate::client::ClientOptions).
mod correlation;
pub mod http;
pub mod jsonrpc;
pub mod tcp;
pub mod websocket;

pub use jsonrpc::{JsonRpcResponse, Notification};

use crate::BoxError;
use serde_json::Value;
use std::future::Future;

/// Errors that can occur while exchanging a request with the service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("Failed to connect to '{url}': '{source}'")]
    Connect {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("I/O error: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: '{0}'")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket error: '{0}'")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Failed to encode request: '{0}'")]
    Encode(#[source] serde_json::Error),
    #[error("Received a malformed response: '{0}'")]
    Decode(String),
    #[error("Server returned error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,
}

/// A channel able to carry JSON-RPC requests to the service.
pub trait Transport {
    /// Sends `method` with `params` and waits for its response.
    ///
    /// # Arguments
    ///
    /// * `id` - Correlation id for the request. A fresh one is generated when absent.
    fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        id: Option<String>,
    ) -> impl Future<Output = Result<JsonRpcResponse, TransportError>> + Send;

    /// Opens the connection, to `url` when given. No-op for one-shot transports.
    fn connect(
        &mut self,
        url: Option<&str>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let _ = url;
        async { Ok(()) }
    }

    /// Closes the connection. Always completes, no-op for one-shot transports.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// The transports a client can be configured with.
pub enum AnyTransport {
    Http(http::HttpTransport),
    Tcp(tcp::TcpTransport),
    WebSocket(websocket::WebSocketTransport),
}

impl AnyTransport {
    /// Returns the persistent transport, if that is what this is.
    pub fn as_websocket(&self) -> Option<&websocket::WebSocketTransport> {
        match self {
            Self::WebSocket(transport) => Some(transport),
            _ => None,
        }
    }
}

impl Transport for AnyTransport {
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        id: Option<String>,
    ) -> Result<JsonRpcResponse, TransportError> {
        match self {
            Self::Http(transport) => transport.request(method, params, id).await,
            Self::Tcp(transport) => transport.request(method, params, id).await,
            Self::WebSocket(transport) => transport.request(method, params, id).await,
        }
    }

    async fn connect(&mut self, url: Option<&str>) -> Result<(), TransportError> {
        match self {
            Self::WebSocket(transport) => transport.connect(url).await,
            Self::Http(_) | Self::Tcp(_) => Ok(()),
        }
    }

    async fn disconnect(&mut self) {
        if let Self::WebSocket(transport) = self {
            transport.disconnect().await;
        }
    }
}
