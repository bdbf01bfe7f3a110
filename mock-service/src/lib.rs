//! # Mock Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a self-describing JSON-RPC
//! service for integration testing `kodirpc-core`.
//! It is not intended for production use.
//!
//! [`MockService`] answers requests in memory. [`WsServer`] and [`TcpServer`] expose it on a
//! local port, optionally pushing scripted frames (garbage, notifications, stale responses)
//! ahead of every response.
mod server;

pub use server::{TcpServer, WsServer};

use serde_json::{Map, Value, json};

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// The `JSONRPC.Introspect` result of the mock service.
pub fn service_description() -> Value {
    json!({
        "description": "JSON-RPC API of the mock service",
        "id": "http://xbmc.org/jsonrpc/ServiceDescription.json",
        "version": "13.5.0",
        "methods": {
            "JSONRPC.Introspect": {
                "description": "Enumerates all actions and descriptions",
                "params": [
                    {"name": "getdescriptions", "type": "boolean", "default": true},
                    {"name": "getmetadata", "type": "boolean", "default": false}
                ],
                "returns": {"type": "object"},
                "type": "method"
            },
            "JSONRPC.Ping": {
                "description": "Ping responder",
                "params": [],
                "returns": {"type": "string"},
                "type": "method"
            },
            "JSONRPC.Version": {
                "description": "Retrieve the JSON-RPC protocol version.",
                "params": [],
                "returns": {
                    "type": "object",
                    "properties": {
                        "version": {
                            "type": "object",
                            "required": true,
                            "properties": {
                                "major": {"type": "integer", "required": true},
                                "minor": {"type": "integer", "required": true},
                                "patch": {"type": "integer", "required": true}
                            }
                        }
                    }
                },
                "type": "method"
            },
            "Demo.Echo": {
                "description": "Returns its argument",
                "params": [{"name": "value", "type": "string", "required": true}],
                "returns": {"type": "string"},
                "type": "method"
            },
            "Demo.Add": {
                "description": "Adds two integers",
                "params": [
                    {"name": "a", "type": "integer", "required": true},
                    {"name": "b", "type": "integer", "default": 0}
                ],
                "returns": {"type": "integer"},
                "type": "method"
            },
            "Demo.GetProperties": {
                "description": "Retrieves the values of the given properties",
                "params": [{"name": "properties", "$ref": "Demo.Property.List", "required": true}],
                "returns": {
                    "type": "object",
                    "additionalProperties": {"type": ["string", "integer"]}
                },
                "type": "method"
            },
            "Demo.Broken": {
                "description": "Returns something that does not match its declared result",
                "params": [],
                "returns": {"type": "integer"},
                "type": "method"
            },
            "Player.GetActivePlayers": {
                "description": "Returns all active players",
                "params": [],
                "returns": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "playerid": {"type": "integer", "required": true},
                            "type": {"type": "string", "required": true}
                        }
                    }
                },
                "type": "method"
            }
        },
        "notifications": {
            "Player.OnPlay": {
                "description": "Playback of a media item has been started",
                "params": [
                    {"name": "sender", "type": "string", "required": true},
                    {"name": "data", "type": "any", "required": true}
                ],
                "returns": null,
                "type": "notification"
            },
            "System.OnQuit": {
                "description": "The application will be closed",
                "params": [
                    {"name": "sender", "type": "string", "required": true},
                    {"name": "data", "type": "any", "required": true}
                ],
                "returns": null,
                "type": "notification"
            }
        },
        "types": {
            "Demo.Property": {
                "type": "string",
                "enum": ["volume", "language", "name"]
            },
            "Demo.Property.List": {
                "type": "array",
                "items": {"$ref": "Demo.Property"},
                "uniqueItems": true
            }
        }
    })
}

/// A notification frame, as the service pushes it.
pub fn notification(method: &str, data: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": {"sender": "xbmc", "data": data}
    })
    .to_string()
}

/// Answers JSON-RPC requests for the methods of [`service_description`].
#[derive(Debug, Clone, Default)]
pub struct MockService;

impl MockService {
    /// Returns the response envelope for a request envelope.
    pub fn handle(&self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let params = request
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match self.dispatch(method, &params) {
            Ok(result) => json!({"id": id, "jsonrpc": "2.0", "result": result}),
            Err((code, message)) => json!({
                "id": id,
                "jsonrpc": "2.0",
                "error": {"code": code, "message": message}
            }),
        }
    }

    fn dispatch(&self, method: &str, params: &Map<String, Value>) -> Result<Value, (i64, String)> {
        match method {
            "JSONRPC.Introspect" => Ok(service_description()),
            "JSONRPC.Ping" => Ok(json!("pong")),
            "JSONRPC.Version" => Ok(json!({"version": {"major": 13, "minor": 5, "patch": 0}})),
            "Demo.Echo" => params
                .get("value")
                .cloned()
                .ok_or_else(|| invalid_params("value")),
            "Demo.Add" => {
                let a = params.get("a").and_then(Value::as_i64);
                let b = params.get("b").map_or(Some(0), Value::as_i64);
                match (a, b) {
                    (Some(a), Some(b)) => Ok(json!(a + b)),
                    _ => Err(invalid_params("a, b")),
                }
            }
            "Demo.GetProperties" => {
                let properties = params
                    .get("properties")
                    .and_then(Value::as_array)
                    .ok_or_else(|| invalid_params("properties"))?;

                Ok(properties
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|property| (property.to_string(), property_value(property)))
                    .collect::<Map<_, _>>()
                    .into())
            }
            "Demo.Broken" => Ok(json!("not a number")),
            "Player.GetActivePlayers" => Ok(json!([{"playerid": 1, "type": "audio"}])),
            _ => Err((METHOD_NOT_FOUND, "Method not found.".to_string())),
        }
    }
}

fn property_value(property: &str) -> Value {
    match property {
        "volume" => json!(87),
        "language" => json!("en_GB"),
        other => json!(other),
    }
}

fn invalid_params(which: &str) -> (i64, String) {
    (INVALID_PARAMS, format!("Invalid params: {which}"))
}
