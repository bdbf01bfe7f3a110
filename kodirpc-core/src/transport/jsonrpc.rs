//! # JSON-RPC 2.0 Envelopes
//!
//! Encoding of outgoing requests and classification of inbound frames, shared by every
//! transport.
//!
//! An inbound frame is either:
//!
//! * a **response** (`result` or `error`, usually with the `id` of the request), or
//! * a **notification** (`method` without `id`), pushed by the service on its own.
//!
//! Anything else is a decode error; what to do with it is the transport's decision.
use super::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// The response envelope every transport returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: String,
    pub jsonrpc: String,
    pub result: Value,
}

/// An unsolicited message pushed by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcFault {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A decoded response frame, not yet attributed to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: Option<String>,
    pub outcome: Result<Value, RpcFault>,
}

impl ResponseFrame {
    /// Turns the frame into the envelope returned to callers.
    ///
    /// A frame without an `id` is attributed to `fallback_id`.
    pub fn into_response(self, fallback_id: &str) -> Result<JsonRpcResponse, TransportError> {
        let result = self.outcome.map_err(|fault| TransportError::Remote {
            code: fault.code,
            message: fault.message,
            data: fault.data,
        })?;

        Ok(JsonRpcResponse {
            id: self.id.unwrap_or_else(|| fallback_id.to_string()),
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
        })
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response(ResponseFrame),
    Notification(Notification),
}

impl Inbound {
    /// Expects a response. Used by transports that never receive notifications on purpose.
    pub fn into_response(self, fallback_id: &str) -> Result<JsonRpcResponse, TransportError> {
        match self {
            Self::Response(frame) => frame.into_response(fallback_id),
            Self::Notification(notification) => Err(TransportError::Decode(format!(
                "expected a response, received notification '{}'",
                notification.method
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a JSON-RPC response or notification")]
    NotJsonRpc,
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    id: &'a str,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcFault>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

/// Serializes a request envelope.
pub fn encode_request(
    method: &str,
    params: Option<&Value>,
    id: &str,
) -> Result<String, TransportError> {
    serde_json::to_string(&Request {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
        id,
    })
    .map_err(TransportError::Encode)
}

/// Parses and classifies a text frame.
pub fn decode_frame(text: &str) -> Result<Inbound, FrameDecodeError> {
    decode_value(serde_json::from_str(text)?)
}

/// Classifies an already parsed frame.
pub fn decode_value(value: Value) -> Result<Inbound, FrameDecodeError> {
    if !value.is_object() {
        return Err(FrameDecodeError::NotJsonRpc);
    }

    let frame: RawFrame = serde_json::from_value(value)?;
    let id = frame.id.and_then(id_to_string);

    if let Some(fault) = frame.error {
        return Ok(Inbound::Response(ResponseFrame {
            id,
            outcome: Err(fault),
        }));
    }

    match (frame.method, id) {
        (Some(method), None) => Ok(Inbound::Notification(Notification {
            method,
            params: frame.params.unwrap_or(Value::Null),
        })),
        (None, None) if frame.result.is_none() => Err(FrameDecodeError::NotJsonRpc),
        (_, id) => Ok(Inbound::Response(ResponseFrame {
            id,
            outcome: Ok(frame.result.unwrap_or(Value::Null)),
        })),
    }
}

fn id_to_string(id: Value) -> Option<String> {
    match id {
        Value::String(id) => Some(id),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_named_params() {
        let params = json!({"value": "hi"});
        let body = encode_request("Demo.Echo", Some(&params), "abc").unwrap();
        let decoded: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(
            decoded,
            json!({"jsonrpc": "2.0", "method": "Demo.Echo", "params": {"value": "hi"}, "id": "abc"})
        );
    }

    #[test]
    fn omits_absent_params() {
        let body = encode_request("JSONRPC.Introspect", None, "1").unwrap();
        let decoded: Value = serde_json::from_str(&body).unwrap();

        assert!(decoded.get("params").is_none());
    }

    #[test]
    fn classifies_responses_and_notifications() {
        let response = decode_frame(r#"{"id": "1", "jsonrpc": "2.0", "result": "pong"}"#).unwrap();
        assert_eq!(
            response,
            Inbound::Response(ResponseFrame {
                id: Some("1".to_string()),
                outcome: Ok(json!("pong")),
            })
        );

        let numeric = decode_frame(r#"{"id": 7, "jsonrpc": "2.0", "result": null}"#).unwrap();
        assert!(matches!(numeric, Inbound::Response(ResponseFrame { id: Some(ref id), .. }) if id == "7"));

        let notification = decode_frame(
            r#"{"jsonrpc": "2.0", "method": "Player.OnPlay", "params": {"sender": "xbmc"}}"#,
        )
        .unwrap();
        assert_eq!(
            notification,
            Inbound::Notification(Notification {
                method: "Player.OnPlay".to_string(),
                params: json!({"sender": "xbmc"}),
            })
        );
    }

    #[test]
    fn surfaces_remote_errors() {
        let frame = decode_frame(
            r#"{"id": "1", "jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found."}}"#,
        )
        .unwrap();

        let err = frame.into_response("1").unwrap_err();
        assert!(matches!(err, TransportError::Remote { code: -32601, .. }));
    }

    #[test]
    fn rejects_non_jsonrpc_frames() {
        assert!(matches!(decode_frame("not json"), Err(FrameDecodeError::Json(_))));
        assert!(matches!(decode_frame("[1, 2]"), Err(FrameDecodeError::NotJsonRpc)));
        assert!(matches!(decode_frame(r#"{"hello": 1}"#), Err(FrameDecodeError::NotJsonRpc)));
    }

    #[test]
    fn attributes_missing_id_to_fallback() {
        let frame = ResponseFrame {
            id: None,
            outcome: Ok(json!("ok")),
        };

        assert_eq!(frame.into_response("last").unwrap().id, "last");
    }
}
