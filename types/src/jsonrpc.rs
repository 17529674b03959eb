//! JSON-RPC 2.0 wire types used by the MCP transports.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// The only JSON-RPC version MCP speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Inbound JSON-RPC message.
///
/// `id` is `Some` whenever the member is present, including `"id": null`,
/// so requests and notifications can be told apart reliably.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// Whether this message expects a reply.
    pub fn is_request(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this message is a notification (no `id` member).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Return the `id` member of a raw JSON-RPC message, if present.
pub fn message_id(message: &Value) -> Option<&Value> {
    message.as_object().and_then(|obj| obj.get("id"))
}

/// Return the `method` member of a raw JSON-RPC message, if present.
pub fn message_method(message: &Value) -> Option<&str> {
    message.get("method").and_then(Value::as_str)
}

/// JSON-RPC 2.0 Response.
///
/// Member order on the wire is `jsonrpc`, `id`, then `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response. Empty results are normalised to `{}`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(normalize_result(result)),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Create an internal error (-32603) response.
    pub fn internal_error(id: Value, message: impl Into<String>) -> Self {
        Self::error(id, error_codes::INTERNAL_ERROR, message)
    }

    /// Parse error response; the id is unknown so it is `null`.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, error_codes::PARSE_ERROR, message)
    }
}

/// JSON-RPC 2.0 Error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP requires `result` to be an object; an empty list or a missing value
/// must go out as `{}`.
pub fn normalize_result(result: Value) -> Value {
    match result {
        Value::Null => Value::Object(Map::new()),
        Value::Array(items) if items.is_empty() => Value::Object(Map::new()),
        other => other,
    }
}

/// Keep-alive notification sent on bidirectional line transports.
pub fn ping_notification() -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "method": "ping" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let response = JsonRpcResponse::success(json!("42"), json!({"tools": []}));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","id":"42","result":{"tools":[]}}"#
        );
    }

    #[test]
    fn test_empty_array_result_becomes_object() {
        let response = JsonRpcResponse::success(json!(1), json!([]));
        assert_eq!(response.result, Some(json!({})));

        let response = JsonRpcResponse::success(json!(1), Value::Null);
        assert_eq!(response.result, Some(json!({})));

        // Non-empty arrays are left alone
        let response = JsonRpcResponse::success(json!(1), json!([1]));
        assert_eq!(response.result, Some(json!([1])));
    }

    #[test]
    fn test_internal_error_envelope_is_exact() {
        let response = JsonRpcResponse::internal_error(json!(7), "boom");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","id":7,"error":{"code":-32603,"message":"boom"}}"#
        );
    }

    #[test]
    fn test_null_id_still_counts_as_request() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": null, "method": "ping"}))
                .unwrap();
        assert!(request.is_request());
        assert_eq!(request.id, Some(Value::Null));

        let notification: JsonRpcRequest = serde_json::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .unwrap();
        assert!(notification.is_notification());
    }

    #[test]
    fn test_raw_message_helpers() {
        let message = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"});
        assert_eq!(message_id(&message), Some(&json!(3)));
        assert_eq!(message_method(&message), Some("tools/list"));
        assert_eq!(message_id(&json!({"method": "ping"})), None);
    }

    #[test]
    fn test_ping_notification() {
        assert_eq!(
            serde_json::to_string(&ping_notification()).unwrap(),
            r#"{"jsonrpc":"2.0","method":"ping"}"#
        );
    }
}
