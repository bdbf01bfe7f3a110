//! # Namespace Resolution
//!
//! A [`NamespaceHandle`] groups the methods sharing a prefix (`Player` for `Player.Open`,
//! `Player.Stop`, ...). Handles start **unresolved**: asking one for a method synthesizes a
//! callable bound to `Namespace.PascalCase(name)`, and the first call of such a callable
//! materializes the whole namespace. Once the client holds the service description, the first
//! lookup materializes it instead. A **resolved** handle owns a [`MethodTable`] with every
//! declared method pre-built, each reachable under its remote spelling and its `camelCase`
//! alias.
use super::naming::{is_numeric_key, qualify, to_local_alias, to_remote_name};
use super::{CallError, ClientInner};
use crate::transport::Transport;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// Member names of a namespace handle itself. They never resolve to a method.
pub const RESERVED_METHODS: &[&str] = &["listMethods", "ListMethods"];

/// The methods of one namespace, as exposed to callers.
pub struct NamespaceHandle<T> {
    name: String,
    client: Weak<ClientInner<T>>,
    this: Weak<NamespaceHandle<T>>,
    table: OnceLock<MethodTable<T>>,
}

impl<T> fmt::Debug for NamespaceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceHandle")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> NamespaceHandle<T> {
    pub(crate) fn new(name: &str, client: Weak<ClientInner<T>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            client,
            this: this.clone(),
            table: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the method table has been built.
    pub fn is_resolved(&self) -> bool {
        self.table.get().is_some()
    }

    /// Returns the callable for `name`, in either spelling.
    ///
    /// If the client already holds the service description, an unresolved handle is
    /// materialized here, without waiting for a first call.
    ///
    /// # Returns
    ///
    /// * `None` - For numeric keys and [`RESERVED_METHODS`], or when the namespace is resolved
    ///   and declares no such method.
    pub fn method(&self, name: &str) -> Option<RemoteMethod<T>> {
        if name.is_empty() || is_numeric_key(name) || RESERVED_METHODS.contains(&name) {
            return None;
        }

        match self.table.get().or_else(|| self.materialize_cached()) {
            Some(table) => table.get(name).cloned(),
            None => Some(RemoteMethod::new(
                qualify(&self.name, &to_remote_name(name)),
                to_local_alias(name),
                self.client.clone(),
                Some(self.this.clone()),
            )),
        }
    }

    /// Builds the table from the client's cached description, if there is one.
    fn materialize_cached(&self) -> Option<&MethodTable<T>> {
        let cache = self.client.upgrade()?.cached_introspection()?;
        let methods = cache.namespace_methods(&self.name)?;
        Some(self.materialize(methods))
    }

    fn materialize(&self, methods: &[String]) -> &MethodTable<T> {
        self.table.get_or_init(|| {
            debug!(namespace = %self.name, methods = methods.len(), "namespace resolved");
            MethodTable::build(&self.name, methods, &self.client)
        })
    }
}

impl<T> NamespaceHandle<T>
where
    T: Transport + Send + 'static,
{
    /// Materializes the namespace, fetching the service description if needed.
    ///
    /// Only the first successful resolution builds the table; later ones return it as is.
    pub async fn resolve(&self) -> Result<&MethodTable<T>, CallError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }

        let client = self.client.upgrade().ok_or(CallError::ClientDropped)?;
        let cache = client.introspection().await?;

        let Some(methods) = cache.namespace_methods(&self.name) else {
            client.forget_namespace(self);
            return Err(CallError::UnknownNamespace(self.name.clone()));
        };

        Ok(self.materialize(methods))
    }

    /// Bare names of the methods the service declares in this namespace.
    ///
    /// Reads the grouped listing, independently of the callables built so far. Empty when the
    /// service declares no such namespace.
    pub async fn list_methods(&self) -> Result<Vec<String>, CallError> {
        let client = self.client.upgrade().ok_or(CallError::ClientDropped)?;
        let cache = client.introspection().await?;

        Ok(cache
            .namespace_methods(&self.name)
            .map(<[String]>::to_vec)
            .unwrap_or_default())
    }
}

/// Every method of a namespace, keyed by each accepted spelling.
pub struct MethodTable<T> {
    methods: HashMap<String, RemoteMethod<T>>,
    names: Vec<String>,
}

impl<T> MethodTable<T> {
    fn build(namespace: &str, bare_names: &[String], client: &Weak<ClientInner<T>>) -> Self {
        let mut methods = HashMap::with_capacity(bare_names.len() * 2);
        let mut aliases = Vec::with_capacity(bare_names.len());

        for bare in bare_names {
            let method = RemoteMethod::new(
                qualify(namespace, bare),
                to_local_alias(bare),
                client.clone(),
                None,
            );
            aliases.push((to_remote_name(bare), method.clone()));
            aliases.push((to_local_alias(bare), method.clone()));
            methods.insert(bare.clone(), method);
        }

        // Declared names win over derived spellings.
        for (alias, method) in aliases {
            methods.entry(alias).or_insert(method);
        }

        Self {
            methods,
            names: bare_names.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RemoteMethod<T>> {
        self.methods.get(name)
    }

    /// Declared bare names, in declaration order.
    pub fn method_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A remote method bound to its client.
///
/// Clones, and the entries of a [`MethodTable`] for both spellings of a method, share one
/// binding; [`ptr_eq`](Self::ptr_eq) tells whether two values are the same callable.
pub struct RemoteMethod<T> {
    binding: Arc<MethodBinding<T>>,
}

struct MethodBinding<T> {
    method: String,
    alias: String,
    client: Weak<ClientInner<T>>,
    /// Set on callables synthesized by an unresolved namespace.
    namespace: Option<Weak<NamespaceHandle<T>>>,
}

impl<T> Clone for RemoteMethod<T> {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
        }
    }
}

impl<T> fmt::Debug for RemoteMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMethod")
            .field("method", &self.binding.method)
            .field("alias", &self.binding.alias)
            .finish()
    }
}

impl<T> RemoteMethod<T> {
    fn new(
        method: String,
        alias: String,
        client: Weak<ClientInner<T>>,
        namespace: Option<Weak<NamespaceHandle<T>>>,
    ) -> Self {
        Self {
            binding: Arc::new(MethodBinding {
                method,
                alias,
                client,
                namespace,
            }),
        }
    }

    /// The fully qualified name sent to the service.
    pub fn remote_name(&self) -> &str {
        &self.binding.method
    }

    /// The `camelCase` spelling of the bare name.
    pub fn alias(&self) -> &str {
        &self.binding.alias
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.binding, &other.binding)
    }
}

impl<T> RemoteMethod<T>
where
    T: Transport + Send + 'static,
{
    /// Calls the method with positional `args` under the client's validation policy.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, CallError> {
        let client = self
            .binding
            .client
            .upgrade()
            .ok_or(CallError::ClientDropped)?;

        if let Some(namespace) = self.binding.namespace.as_ref().and_then(Weak::upgrade) {
            match namespace.resolve().await {
                // An undeclared namespace surfaces as an unknown method below.
                Ok(_) | Err(CallError::UnknownNamespace(_)) => {}
                Err(err) => return Err(err),
            }
        }

        client.invoke(&self.binding.method, args, client.policy).await
    }
}
