//! # Schema Validation
//!
//! The client never interprets JSON Schema itself; it delegates to a [`SchemaValidator`].
//!
//! [`JsonSchemaValidator`] is the default implementation, built on the `jsonschema` crate.
//! Every type the service declares is registered as a resource under `json-schema:///<Type>`,
//! which is exactly where a relative `"$ref": "<Type>"` resolves to, so cross references between
//! declared types work without rewriting them.
//!
//! Services in the wild still speak draft-03 (`"required": true`, `"extends"`, `"type": "any"`,
//! type unions containing schemas). Schemas are normalized to their draft-04 equivalent before
//! they are compiled.
use jsonschema::{Draft, Registry, Validator};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const BASE_URI: &str = "json-schema:///";

/// A single reported schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending part of the instance (empty for the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at '{}')", self.message, self.path)
        }
    }
}

impl SchemaViolation {
    fn at_root(message: String) -> Self {
        Self {
            path: String::new(),
            message,
        }
    }
}

/// The result of validating one value against one schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Violations in the order the validator reported them.
    pub errors: Vec<SchemaViolation>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<SchemaViolation>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// The validation primitive the introspection cache relies on.
pub trait SchemaValidator {
    /// Makes `schema` resolvable by other schemas through `"$ref": "<name>"`.
    fn register(&mut self, name: &str, schema: &Value);

    fn validate(&self, value: &Value, schema: &Value) -> ValidationOutcome;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
///
/// Registered types are assembled into one [`Registry`] on the first validation. Compiled
/// validators are kept per schema, so repeated checks against the same parameter or result
/// schema skip compilation. Registering a type discards both.
#[derive(Debug, Default)]
pub struct JsonSchemaValidator {
    resources: Vec<(String, Value)>,
    registry: OnceLock<Result<Registry, String>>,
    compiled: Mutex<HashMap<String, Arc<Validator>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> Result<&Registry, SchemaViolation> {
        self.registry
            .get_or_init(|| {
                let resources = self.resources.iter().map(|(uri, contents)| {
                    (uri.as_str(), Draft::Draft4.create_resource(contents.clone()))
                });

                Registry::options()
                    .draft(Draft::Draft4)
                    .build(resources)
                    .map_err(|err| err.to_string())
            })
            .as_ref()
            .map_err(|err| SchemaViolation::at_root(format!("declared types could not be loaded: {err}")))
    }

    fn compiled(&self, schema: &Value) -> Result<Arc<Validator>, SchemaViolation> {
        let key = schema.to_string();

        if let Some(validator) = self.cache().get(&key) {
            return Ok(Arc::clone(validator));
        }

        let validator = jsonschema::options()
            .with_draft(Draft::Draft4)
            .with_registry(self.registry()?.clone())
            .build(&normalize(schema))
            .map(Arc::new)
            .map_err(|err| SchemaViolation::at_root(format!("schema could not be compiled: {err}")))?;

        Ok(Arc::clone(self.cache().entry(key).or_insert(validator)))
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Validator>>> {
        self.compiled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn register(&mut self, name: &str, schema: &Value) {
        self.resources
            .push((format!("{BASE_URI}{name}"), normalize(schema)));
        self.registry = OnceLock::new();
        self.compiled
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn validate(&self, value: &Value, schema: &Value) -> ValidationOutcome {
        let validator = match self.compiled(schema) {
            Ok(validator) => validator,
            Err(violation) => return ValidationOutcome::invalid(vec![violation]),
        };

        let errors: Vec<SchemaViolation> = validator
            .iter_errors(value)
            .map(|err| SchemaViolation {
                path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect();

        if errors.is_empty() {
            ValidationOutcome::valid()
        } else {
            ValidationOutcome::invalid(errors)
        }
    }
}

/// Rewrites draft-03 constructs into draft-04.
fn normalize(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();
    let mut required = Vec::new();
    let mut all_of = Vec::new();

    for (key, value) in object {
        match (key.as_str(), value) {
            // Draft-03 marks required properties on the property itself.
            ("required", Value::Bool(_)) => {}
            ("properties", Value::Object(properties)) => {
                let mut normalized = Map::new();
                for (name, property) in properties {
                    if property.get("required") == Some(&Value::Bool(true)) {
                        required.push(Value::String(name.clone()));
                    }
                    normalized.insert(name.clone(), normalize(property));
                }
                out.insert(key.clone(), Value::Object(normalized));
            }
            ("patternProperties" | "definitions", Value::Object(schemas)) => {
                let normalized = schemas
                    .iter()
                    .map(|(name, schema)| (name.clone(), normalize(schema)))
                    .collect();
                out.insert(key.clone(), Value::Object(normalized));
            }
            ("extends", Value::Array(parents)) => all_of.extend(parents.iter().map(extended)),
            ("extends", parent) => all_of.push(extended(parent)),
            ("type", Value::String(kind)) if kind == "any" => {}
            ("type", Value::Array(kinds)) if kinds.iter().any(|k| k == "any") => {}
            ("type", Value::Array(kinds)) if kinds.iter().any(Value::is_object) => {
                let alternatives: Vec<Value> = kinds
                    .iter()
                    .map(|kind| match kind {
                        Value::String(name) => json!({ "type": name }),
                        other => normalize(other),
                    })
                    .collect();
                all_of.push(json!({ "anyOf": alternatives }));
            }
            ("items" | "additionalItems" | "additionalProperties" | "not", _) => {
                out.insert(key.clone(), normalize_nested(value));
            }
            ("allOf" | "anyOf" | "oneOf", Value::Array(schemas)) => {
                let normalized = schemas.iter().map(normalize).collect();
                out.insert(key.clone(), Value::Array(normalized));
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    if !required.is_empty() {
        match out.get_mut("required") {
            Some(Value::Array(existing)) => existing.extend(required),
            _ => {
                out.insert("required".to_string(), Value::Array(required));
            }
        }
    }

    if !all_of.is_empty() {
        match out.get_mut("allOf") {
            Some(Value::Array(existing)) => existing.extend(all_of),
            _ => {
                out.insert("allOf".to_string(), Value::Array(all_of));
            }
        }
    }

    Value::Object(out)
}

/// `extends` names its parent type directly instead of wrapping it in a `$ref`.
fn extended(parent: &Value) -> Value {
    match parent {
        Value::String(name) => json!({ "$ref": name }),
        other => normalize(other),
    }
}

fn normalize_nested(value: &Value) -> Value {
    match value {
        Value::Array(schemas) => Value::Array(schemas.iter().map(normalize).collect()),
        other => normalize(other),
    }
}
