//! # Kodi Client
//!
//! This module implements the high-level logic for calling a self-describing JSON-RPC service
//! without compile-time bindings.
//!
//! The [`KodiClient`] fetches the service description (`JSONRPC.Introspect`) once, on first use,
//! and caches it. Methods are then reachable in two ways:
//!
//! 1. **Flat**: [`KodiClient::invoke`] with a fully qualified name (`"Player.GetActivePlayers"`).
//! 2. **Namespaced**: [`KodiClient::namespace`] hands out a [`NamespaceHandle`], whose
//!    [`method`](NamespaceHandle::method) accepts both the remote `PascalCase` spelling and a
//!    `camelCase` alias.
//!
//! Either way, arguments are bound positionally to the declared parameters, validated against
//! their schemas, and the result is validated against the declared return schema. Validation is
//! observational unless [`ValidationPolicy::Enforce`] is selected.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kodirpc_core::client::KodiClient;
//! use kodirpc_core::serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KodiClient::ws()?;
//!
//! // Flat invocation
//! let pong = client.invoke("JSONRPC.Ping", vec![]).await?;
//!
//! // Namespaced invocation, camelCase alias
//! let player = client.namespace("Player").ok_or("reserved name")?;
//! let players = player
//!     .method("getActivePlayers")
//!     .ok_or("reserved name")?
//!     .call(vec![])
//!     .await?;
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```
mod invoke;
pub mod naming;
mod namespace;
mod options;

pub use namespace::*;
pub use options::*;

use crate::introspection::{
    Catalogue, INTROSPECT_METHOD, IntrospectionCache, IntrospectionError, ValidationError,
    ValidationPolicy,
};
use crate::transport::websocket::{FrameChannels, MalformedFrameError};
use crate::transport::{AnyTransport, Notification, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Member names of [`KodiClient`], in both spellings. They never resolve to a namespace.
pub const RESERVED_MEMBERS: &[&str] = &[
    "connect",
    "disconnect",
    "introspection",
    "refresh_introspection",
    "refreshIntrospection",
    "list_methods",
    "listMethods",
    "ListMethods",
    "list_methods_grouped",
    "listMethodsGrouped",
    "invoke",
    "invoke_with",
    "invokeWith",
    "namespace",
    "validation_policy",
    "validationPolicy",
    "frame_errors",
    "frameErrors",
    "notifications",
];

/// Errors that can occur while calling a remote method.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Method '{0}' is not declared by the service")]
    UnknownMethod(String),
    #[error("Namespace '{0}' is not declared by the service")]
    UnknownNamespace(String),
    #[error("'{method}' declares {expected} parameters but {given} arguments were given")]
    Arity {
        method: String,
        expected: usize,
        given: usize,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Transport error: '{0}'")]
    Transport(#[from] TransportError),
    #[error("Failed to read the service description: '{0}'")]
    Introspection(#[from] IntrospectionError),
    #[error("The client this method belongs to was dropped")]
    ClientDropped,
}

type NamespaceRegistry<T> = HashMap<String, Arc<NamespaceHandle<T>>>;

/// A dynamic client for a service that describes itself through `JSONRPC.Introspect`.
///
/// Cloning is cheap: clones share the transport, the cached description and the namespaces.
pub struct KodiClient<T = AnyTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for KodiClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ClientInner<T> {
    /// Held for the whole exchange, which keeps requests single-flight.
    transport: tokio::sync::Mutex<T>,
    cache: RwLock<Option<Arc<IntrospectionCache>>>,
    namespaces: Mutex<NamespaceRegistry<T>>,
    policy: ValidationPolicy,
    channels: Option<FrameChannels>,
}

impl KodiClient<AnyTransport> {
    /// Builds a client from options. No connection is made until the first call.
    ///
    /// # Returns
    ///
    /// * `Ok(KodiClient)` - The client, with the transport selected by `options.transport`.
    /// * `Err(TransportError)` - If the endpoint is invalid or the transport cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self, TransportError> {
        let transport = AnyTransport::from_options(&options)?;
        let channels = transport
            .as_websocket()
            .map(|transport| transport.channels().clone());

        Ok(Self::from_parts(
            transport,
            options.validation_policy(),
            channels,
        ))
    }

    /// HTTP client with Kodi defaults.
    pub fn http() -> Result<Self, TransportError> {
        Self::new(ClientOptions::new(TransportKind::Http))
    }

    /// HTTPS client with Kodi defaults. Stock Kodi does not serve HTTPS.
    pub fn https() -> Result<Self, TransportError> {
        Self::new(ClientOptions::new(TransportKind::Https))
    }

    /// Raw TCP client with Kodi defaults.
    pub fn tcp() -> Result<Self, TransportError> {
        Self::new(ClientOptions::new(TransportKind::Tcp))
    }

    /// WebSocket client with Kodi defaults.
    pub fn ws() -> Result<Self, TransportError> {
        Self::new(ClientOptions::new(TransportKind::Ws))
    }
}

impl<T> KodiClient<T>
where
    T: Transport + Send + 'static,
{
    /// Creates a client on top of an existing transport.
    pub fn from_transport(transport: T, policy: ValidationPolicy) -> Self {
        Self::from_parts(transport, policy, None)
    }

    fn from_parts(transport: T, policy: ValidationPolicy, channels: Option<FrameChannels>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport: tokio::sync::Mutex::new(transport),
                cache: RwLock::new(None),
                namespaces: Mutex::new(HashMap::new()),
                policy,
                channels,
            }),
        }
    }

    /// Opens the transport's connection. No-op for one-shot transports.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.inner.transport.lock().await.connect(None).await
    }

    /// Closes the transport's connection. Always completes.
    pub async fn disconnect(&self) {
        self.inner.transport.lock().await.disconnect().await;
    }

    /// Returns the cached service description, fetching it on first use.
    pub async fn introspection(&self) -> Result<Arc<IntrospectionCache>, CallError> {
        self.inner.introspection().await
    }

    /// Fetches the service description again and replaces the cached one.
    ///
    /// Namespace handles handed out before the refresh keep working, but the client forgets
    /// them: the next [`namespace`](Self::namespace) access creates a new, unresolved handle.
    pub async fn refresh_introspection(&self) -> Result<Arc<IntrospectionCache>, CallError> {
        let cache = self.inner.fetch_introspection().await?;
        self.inner.registry().clear();
        Ok(cache)
    }

    /// All fully qualified method names, in declaration order.
    pub async fn list_methods(&self) -> Result<Vec<String>, CallError> {
        Ok(self.introspection().await?.list_methods())
    }

    /// Bare method names grouped by namespace.
    pub async fn list_methods_grouped(&self) -> Result<Catalogue<Vec<String>>, CallError> {
        Ok(self.introspection().await?.list_methods_grouped().clone())
    }

    /// Calls `method` (fully qualified) with positional `args`, using the client's policy.
    pub async fn invoke(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CallError> {
        self.inner.invoke(method, args, self.inner.policy).await
    }

    /// Like [`invoke`](Self::invoke), with an explicit validation policy.
    pub async fn invoke_with(
        &self,
        method: &str,
        args: Vec<serde_json::Value>,
        policy: ValidationPolicy,
    ) -> Result<serde_json::Value, CallError> {
        self.inner.invoke(method, args, policy).await
    }

    /// Returns the handle of namespace `name`.
    ///
    /// The handle is created unresolved on first access and the same handle is returned until
    /// the description is refreshed. Nothing is fetched here.
    ///
    /// Only declared namespaces are remembered: once the description is known, an undeclared
    /// name gets a fresh handle on every access, and a remembered handle whose namespace turns
    /// out to be undeclared is forgotten when it fails to resolve.
    ///
    /// # Returns
    ///
    /// * `None` - For the client's own member names ([`RESERVED_MEMBERS`]) and numeric keys.
    pub fn namespace(&self, name: &str) -> Option<Arc<NamespaceHandle<T>>> {
        if name.is_empty() || naming::is_numeric_key(name) || RESERVED_MEMBERS.contains(&name) {
            return None;
        }

        if let Some(cache) = self.inner.cached_introspection()
            && cache.namespace_methods(name).is_none()
        {
            return Some(NamespaceHandle::new(name, Arc::downgrade(&self.inner)));
        }

        let handle = self
            .inner
            .registry()
            .entry(name.to_string())
            .or_insert_with(|| NamespaceHandle::new(name, Arc::downgrade(&self.inner)))
            .clone();

        Some(handle)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        self.inner.policy
    }

    /// Malformed frames received on a persistent connection. `None` for one-shot transports.
    pub fn frame_errors(&self) -> Option<broadcast::Receiver<MalformedFrameError>> {
        self.inner
            .channels
            .as_ref()
            .map(FrameChannels::subscribe_errors)
    }

    /// Notifications pushed on a persistent connection. `None` for one-shot transports.
    pub fn notifications(&self) -> Option<broadcast::Receiver<Notification>> {
        self.inner
            .channels
            .as_ref()
            .map(FrameChannels::subscribe_notifications)
    }
}

impl<T> ClientInner<T> {
    fn registry(&self) -> std::sync::MutexGuard<'_, NamespaceRegistry<T>> {
        self.namespaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached_introspection(&self) -> Option<Arc<IntrospectionCache>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops `handle` from the registry, unless another handle took its place.
    fn forget_namespace(&self, handle: &NamespaceHandle<T>) {
        let mut registry = self.registry();

        let registered = registry
            .get(handle.name())
            .is_some_and(|known| std::ptr::eq(Arc::as_ptr(known), handle));

        if registered {
            debug!(namespace = handle.name(), "forgetting undeclared namespace");
            registry.remove(handle.name());
        }
    }
}

impl<T> ClientInner<T>
where
    T: Transport + Send + 'static,
{
    pub(crate) async fn introspection(&self) -> Result<Arc<IntrospectionCache>, CallError> {
        match self.cached_introspection() {
            Some(cache) => Ok(cache),
            None => self.fetch_introspection().await,
        }
    }

    async fn fetch_introspection(&self) -> Result<Arc<IntrospectionCache>, CallError> {
        let id = Uuid::new_v4().to_string();
        debug!(%id, "fetching service description");

        let response = {
            let mut transport = self.transport.lock().await;
            transport.request(INTROSPECT_METHOD, None, Some(id)).await?
        };

        let cache = Arc::new(IntrospectionCache::from_response(response)?);
        debug!(
            version = cache.version(),
            methods = cache.service_description().methods().len(),
            "service description cached"
        );

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&cache));
        Ok(cache)
    }
}
