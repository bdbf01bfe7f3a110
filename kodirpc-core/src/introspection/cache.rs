//! # Introspection Cache
//!
//! An immutable, indexed view over one `JSONRPC.Introspect` response.
//!
//! The cache owns the [`ServiceDescription`] and a [`SchemaValidator`] preloaded with every
//! declared type, so both the flat `invoke` path and the namespaced path validate against the
//! same source of truth. A refresh never mutates a cache: the client builds a new one and drops
//! the old.
use super::types::{
    Catalogue, MethodDescription, NotificationDescription, Schema, ServiceDescription,
};
use crate::transport::JsonRpcResponse;
use crate::validator::{JsonSchemaValidator, SchemaValidator, SchemaViolation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Errors that can occur when building a cache from an introspection response.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("The introspection result is not a service description: '{0}'")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Whether a failed schema validation stops the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Validation is observational: failures are logged and the operation continues.
    #[default]
    Observe,
    /// The first violation is raised as a [`ValidationError`].
    Enforce,
}

impl From<bool> for ValidationPolicy {
    /// Maps a "throw on validation error" flag to a policy.
    fn from(throw_on_invalid: bool) -> Self {
        if throw_on_invalid {
            Self::Enforce
        } else {
            Self::Observe
        }
    }
}

/// What a failed validation was checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationTarget {
    /// A free-standing value handed to [`IntrospectionCache::validate_schema`].
    Value,
    /// A positional argument of a method call.
    Argument {
        method: String,
        position: usize,
        name: String,
    },
    /// The `result` payload of a method call.
    Result { method: String },
}

impl fmt::Display for ValidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("value"),
            Self::Argument {
                method,
                position,
                name,
            } => write!(f, "argument #{position} ('{name}') of '{method}'"),
            Self::Result { method } => write!(f, "result of '{method}'"),
        }
    }
}

/// A value failed its declared schema and the policy asked for enforcement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {target}: {violation}")]
pub struct ValidationError {
    pub target: ValidationTarget,
    /// The first violation reported by the validator.
    pub violation: SchemaViolation,
}

impl ValidationError {
    pub(crate) fn for_argument(self, method: &str, position: usize, name: &str) -> Self {
        Self {
            target: ValidationTarget::Argument {
                method: method.to_string(),
                position,
                name: name.to_string(),
            },
            ..self
        }
    }

    pub(crate) fn for_result(self, method: &str) -> Self {
        Self {
            target: ValidationTarget::Result {
                method: method.to_string(),
            },
            ..self
        }
    }
}

/// The parsed and indexed self-description of a service.
pub struct IntrospectionCache {
    id: Option<String>,
    description: ServiceDescription,
    groups: Catalogue<Vec<String>>,
    validator: Box<dyn SchemaValidator + Send + Sync>,
}

impl fmt::Debug for IntrospectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionCache")
            .field("id", &self.id)
            .field("version", &self.description.version())
            .field("methods", &self.description.methods().len())
            .field("notifications", &self.description.notifications().len())
            .field("types", &self.description.types().len())
            .finish()
    }
}

impl IntrospectionCache {
    /// Builds a cache from the raw response of `JSONRPC.Introspect`.
    pub fn from_response(response: JsonRpcResponse) -> Result<Self, IntrospectionError> {
        let description: ServiceDescription = serde_json::from_value(response.result)?;
        let mut cache = Self::from_description(description);
        cache.id = Some(response.id);
        Ok(cache)
    }

    /// Builds a cache validating with the default [`JsonSchemaValidator`].
    pub fn from_description(description: ServiceDescription) -> Self {
        Self::with_validator(description, JsonSchemaValidator::new())
    }

    /// Builds a cache on top of a custom validator. Every declared type is registered on it.
    pub fn with_validator<V>(description: ServiceDescription, mut validator: V) -> Self
    where
        V: SchemaValidator + Send + Sync + 'static,
    {
        for (name, schema) in description.types().iter() {
            validator.register(name, schema);
        }

        let groups = group_methods(description.methods().names());

        Self {
            id: None,
            description,
            groups,
            validator: Box::new(validator),
        }
    }

    /// The id of the introspection response this cache was built from.
    pub fn response_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn service_description(&self) -> &ServiceDescription {
        &self.description
    }

    /// Looks up a method by its fully qualified name.
    pub fn describe_method(&self, method: &str) -> Option<&MethodDescription> {
        self.description.methods().get(method)
    }

    pub fn describe_notification(&self, notification: &str) -> Option<&NotificationDescription> {
        self.description.notifications().get(notification)
    }

    pub fn describe_type(&self, type_name: &str) -> Option<&Schema> {
        self.description.types().get(type_name)
    }

    /// All fully qualified method names, in the order the service declared them.
    pub fn list_methods(&self) -> Vec<String> {
        self.description.methods().names().map(String::from).collect()
    }

    /// Bare method names grouped by namespace, both in declaration order.
    pub fn list_methods_grouped(&self) -> &Catalogue<Vec<String>> {
        &self.groups
    }

    /// Bare method names of a single namespace.
    pub fn namespace_methods(&self, namespace: &str) -> Option<&[String]> {
        self.groups.get(namespace).map(Vec::as_slice)
    }

    pub fn list_notifications(&self) -> Vec<String> {
        self.description
            .notifications()
            .names()
            .map(String::from)
            .collect()
    }

    pub fn list_types(&self) -> Vec<String> {
        self.description.types().names().map(String::from).collect()
    }

    /// Validates `value` against `schema`.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether the value is valid. Always `true` under [`ValidationPolicy::Enforce`].
    /// * `Err(ValidationError)` - The value is invalid and the policy is [`ValidationPolicy::Enforce`].
    pub fn validate_schema(
        &self,
        value: &Value,
        schema: &Schema,
        policy: ValidationPolicy,
    ) -> Result<bool, ValidationError> {
        let outcome = self.validator.validate(value, schema);

        if outcome.valid {
            return Ok(true);
        }

        let violation = outcome
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(|| SchemaViolation {
                path: String::new(),
                message: "value does not match its schema".to_string(),
            });

        match policy {
            ValidationPolicy::Enforce => Err(ValidationError {
                target: ValidationTarget::Value,
                violation,
            }),
            ValidationPolicy::Observe => {
                debug!(%violation, "ignoring schema violation");
                Ok(false)
            }
        }
    }

    /// The service's declared API version.
    pub fn version(&self) -> &str {
        self.description.version()
    }
}

fn group_methods<'a>(methods: impl Iterator<Item = &'a str>) -> Catalogue<Vec<String>> {
    let mut groups = Catalogue::default();

    for method in methods {
        match method.split_once('.') {
            Some((namespace, bare)) => groups
                .get_mut_or_insert_with(namespace, Vec::new)
                .push(bare.to_string()),
            None => debug!(method, "method name without a namespace, not grouped"),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_on_the_first_separator() {
        let groups = group_methods(
            ["Player.Open", "Addons.GetAddons", "Player.Stop", "Deep.Name.Space", "Orphan"]
                .into_iter(),
        );

        let namespaces: Vec<_> = groups.names().collect();
        assert_eq!(namespaces, ["Player", "Addons", "Deep"]);
        assert_eq!(groups.get("Player").unwrap(), &["Open", "Stop"]);
        assert_eq!(groups.get("Deep").unwrap(), &["Name.Space"]);
        assert!(groups.get("Orphan").is_none());
    }

    #[test]
    fn policy_from_throw_flag() {
        assert_eq!(ValidationPolicy::from(true), ValidationPolicy::Enforce);
        assert_eq!(ValidationPolicy::from(false), ValidationPolicy::Observe);
        assert_eq!(ValidationPolicy::default(), ValidationPolicy::Observe);
    }

    #[test]
    fn validates_against_a_large_catalogue() {
        let types: serde_json::Map<String, Value> = (0..300)
            .map(|i| {
                let schema = match i {
                    0 => serde_json::json!({"type": "array"}),
                    _ => serde_json::json!({"type": "array", "items": {"$ref": format!("Demo.Type{}", i - 1)}}),
                };
                (format!("Demo.Type{i}"), schema)
            })
            .collect();
        let description: ServiceDescription =
            serde_json::from_value(serde_json::json!({"version": "1.0.0", "types": types})).unwrap();
        let cache = IntrospectionCache::from_description(description);

        let name = serde_json::json!({"type": "string"});
        for _ in 0..50 {
            assert_eq!(
                cache.validate_schema(&serde_json::json!("hi"), &name, ValidationPolicy::Enforce),
                Ok(true)
            );
        }

        let nested = serde_json::json!({"$ref": "Demo.Type2"});
        assert_eq!(
            cache.validate_schema(&serde_json::json!([[[]]]), &nested, ValidationPolicy::Observe),
            Ok(true)
        );
        assert_eq!(
            cache.validate_schema(&serde_json::json!([1]), &nested, ValidationPolicy::Observe),
            Ok(false)
        );
    }
}
