//! # Kodirpc Core
//!
//! `kodirpc-core` is the foundational library powering the Kodirpc CLI. It provides a dynamic
//! JSON-RPC client capable of calling any method of a service that describes itself through
//! `JSONRPC.Introspect`, without compile-time bindings for the remote API.
//!
//! ## Key Components
//!
//! * **[`KodiClient`](client::KodiClient):** The main entry point. It fetches and caches the
//!   service description, resolves namespaces and methods at runtime and dispatches calls to
//!   the configured transport.
//! * **[`IntrospectionCache`](introspection::IntrospectionCache):** The parsed, indexed service
//!   description together with a schema validator that knows every declared type.
//! * **[`NamespaceHandle`](client::NamespaceHandle) & [`RemoteMethod`](client::RemoteMethod):**
//!   Lazily materialized callables, reachable both by their remote `PascalCase` spelling and a
//!   `camelCase` alias.
//!
//! ## Transports
//!
//! * **[`HttpTransport`](transport::http::HttpTransport):** One HTTP(S) POST per call.
//! * **[`TcpTransport`](transport::tcp::TcpTransport):** One raw TCP connection per call.
//! * **[`WebSocketTransport`](transport::websocket::WebSocketTransport):** A persistent
//!   connection with single-flight request correlation, an `autoClose` policy and recovery
//!   from malformed inbound frames.
//!
//! ## Re-exports
//!
//! This crate re-exports `serde_json` so consumers build arguments with the same `Value` type
//! the client validates and sends.
pub mod client;
pub mod introspection;
pub mod transport;
pub mod validator;

// Re-exports
pub use serde_json;

/// Type alias for the standard boxed error used in error sources.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
