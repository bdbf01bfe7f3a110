//! # Method Invocation
//!
//! Turns a fully qualified method name and positional arguments into a validated remote call:
//!
//! 1. The service description is fetched if it is not cached yet.
//! 2. Arguments are bound, in order, to the declared parameter names. Surplus arguments fail
//!    before anything is sent.
//! 3. Each argument is validated against its own parameter schema.
//! 4. The request goes out with a fresh correlation id.
//! 5. The `result` payload is validated against the declared return schema and returned.
use super::{CallError, ClientInner};
use crate::introspection::{IntrospectionCache, MethodDescription, ValidationPolicy};
use crate::transport::Transport;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

impl<T> ClientInner<T>
where
    T: Transport + Send + 'static,
{
    pub(crate) async fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
        policy: ValidationPolicy,
    ) -> Result<Value, CallError> {
        let cache = self.introspection().await?;

        let description = cache
            .describe_method(method)
            .ok_or_else(|| CallError::UnknownMethod(method.to_string()))?;

        let params = bind_arguments(&cache, method, description, args, policy)?;

        let id = Uuid::new_v4().to_string();
        debug!(method, %id, "invoking remote method");

        let response = {
            let mut transport = self.transport.lock().await;
            transport.request(method, Some(params), Some(id)).await?
        };

        if let Some(returns) = &description.returns {
            cache
                .validate_schema(&response.result, returns, policy)
                .map_err(|err| err.for_result(method))?;
        }

        Ok(response.result)
    }
}

/// Binds positional arguments to parameter names, validating each against its parameter.
fn bind_arguments(
    cache: &IntrospectionCache,
    method: &str,
    description: &MethodDescription,
    args: Vec<Value>,
    policy: ValidationPolicy,
) -> Result<Value, CallError> {
    if args.len() > description.params.len() {
        return Err(CallError::Arity {
            method: method.to_string(),
            expected: description.params.len(),
            given: args.len(),
        });
    }

    let mut params = Map::with_capacity(args.len());

    for (position, (arg, param)) in args.into_iter().zip(&description.params).enumerate() {
        cache
            .validate_schema(&arg, &param.schema, policy)
            .map_err(|err| err.for_argument(method, position, &param.name))?;

        params.insert(param.name.clone(), arg);
    }

    Ok(Value::Object(params))
}
