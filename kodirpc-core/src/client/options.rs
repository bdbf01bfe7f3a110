//! # Client Options
//!
//! Which transport a [`KodiClient`](super::KodiClient) talks through and where it connects.
//! Every field has a Kodi default, so `ClientOptions::default()` targets the raw TCP interface
//! of a local Kodi instance.
use crate::introspection::ValidationPolicy;
use crate::transport::http::HttpTransport;
use crate::transport::tcp::TcpTransport;
use crate::transport::websocket::WebSocketTransport;
use crate::transport::{AnyTransport, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "localhost";
/// Path of the JSON-RPC endpoint on the HTTP and WebSocket interfaces.
pub const JSONRPC_PATH: &str = "/jsonrpc";

/// The transports Kodi exposes its JSON-RPC API on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    /// Not supported by stock Kodi, but reachable behind a TLS proxy.
    Https,
    #[default]
    Tcp,
    Ws,
}

impl TransportKind {
    /// The port Kodi listens on for this transport.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 8080,
            Self::Https => 443,
            Self::Tcp | Self::Ws => 9090,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::Ws => "ws",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown transport '{0}', expected one of: http, https, tcp, ws")]
pub struct UnknownTransportKind(String);

impl FromStr for TransportKind {
    type Err = UnknownTransportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "tcp" => Ok(Self::Tcp),
            "ws" | "websocket" => Ok(Self::Ws),
            _ => Err(UnknownTransportKind(s.to_string())),
        }
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub host: String,
    /// Falls back to [`TransportKind::default_port`] when unset.
    pub port: Option<u16>,
    /// WebSocket only: close the connection after every response.
    pub close_on_request: bool,
    /// HTTP(S) only: basic auth credentials.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            close_on_request: true,
            username: None,
            password: None,
        }
    }
}

/// Everything needed to build a [`KodiClient`](super::KodiClient).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub transport: TransportKind,
    pub connection: ConnectionOptions,
    /// Raise schema violations as errors instead of logging them.
    pub throw_validation_error: bool,
}

impl ClientOptions {
    /// Kodi defaults for `transport`.
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    pub fn port(&self) -> u16 {
        self.connection
            .port
            .unwrap_or_else(|| self.transport.default_port())
    }

    /// The address the transport connects to: a URL for HTTP(S) and WebSocket, `host:port`
    /// for TCP.
    ///
    /// # Returns
    ///
    /// * `Err(TransportError::InvalidUrl)` - If the host is empty or contains URL syntax.
    pub fn endpoint(&self) -> Result<String, TransportError> {
        let host = self.connection.host.trim();

        if host.is_empty() || host.contains(['/', '?', '#', '@', ' ']) {
            return Err(TransportError::InvalidUrl(host.to_string()));
        }

        let port = self.port();

        Ok(match self.transport {
            TransportKind::Tcp => format!("{host}:{port}"),
            kind => format!("{kind}://{host}:{port}{JSONRPC_PATH}"),
        })
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy::from(self.throw_validation_error)
    }
}

impl AnyTransport {
    /// Builds the transport described by `options`. Nothing is connected yet.
    pub fn from_options(options: &ClientOptions) -> Result<Self, TransportError> {
        let endpoint = options.endpoint()?;

        Ok(match options.transport {
            TransportKind::Http | TransportKind::Https => {
                let transport = HttpTransport::new(endpoint)?;
                match &options.connection.username {
                    Some(username) => Self::Http(
                        transport.with_basic_auth(username, options.connection.password.clone()),
                    ),
                    None => Self::Http(transport),
                }
            }
            TransportKind::Tcp => Self::Tcp(TcpTransport::new(endpoint)),
            TransportKind::Ws => Self::WebSocket(WebSocketTransport::new(
                endpoint,
                options.connection.close_on_request,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoints_use_kodi_defaults() {
        let endpoint = |kind| ClientOptions::new(kind).endpoint().unwrap();

        assert_eq!(endpoint(TransportKind::Http), "http://localhost:8080/jsonrpc");
        assert_eq!(endpoint(TransportKind::Https), "https://localhost:443/jsonrpc");
        assert_eq!(endpoint(TransportKind::Tcp), "localhost:9090");
        assert_eq!(endpoint(TransportKind::Ws), "ws://localhost:9090/jsonrpc");
    }

    #[test]
    fn explicit_port_and_host_win() {
        let mut options = ClientOptions::new(TransportKind::Ws);
        options.connection.host = "kodi.lan".to_string();
        options.connection.port = Some(9999);

        assert_eq!(options.endpoint().unwrap(), "ws://kodi.lan:9999/jsonrpc");
    }

    #[test]
    fn rejects_hosts_that_are_not_hosts() {
        let mut options = ClientOptions::default();
        options.connection.host = "ws://kodi/".to_string();

        assert!(matches!(
            options.endpoint(),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn deserializes_partial_options() {
        let options: ClientOptions = serde_json::from_str(
            r#"{"transport": "ws", "connection": {"close_on_request": false}}"#,
        )
        .unwrap();

        assert_eq!(options.transport, TransportKind::Ws);
        assert_eq!(options.connection.host, "localhost");
        assert!(!options.connection.close_on_request);
        assert_eq!(options.validation_policy(), ValidationPolicy::Observe);
    }

    #[test]
    fn parses_transport_kinds() {
        assert_eq!("WS".parse::<TransportKind>().unwrap(), TransportKind::Ws);
        assert_eq!("tcp".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert!("grpc".parse::<TransportKind>().is_err());
    }
}
