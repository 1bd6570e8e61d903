//! JSON-RPC 2.0 envelope codec.
//!
//! Pure message shapes plus validation. Unknown fields are carried through
//! the flattened `extra` map so forward-compatible extensions survive a
//! round-trip.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::protocol::constants::JSONRPC_VERSION;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Parse error (invalid JSON)
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request (malformed envelope)
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC 2.0 request id: integer or string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Numeric view of the id, used to key the pending-request table.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            RequestId::String(s) => s.parse().ok(),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// JSON-RPC 2.0 request. A request without an id is a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Forward-compatible extension fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params,
            id,
            extra: HashMap::new(),
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(method, params, None)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            result: Some(result),
            error: None,
            id,
            extra: HashMap::new(),
        }
    }

    pub fn error(error: JsonRpcError, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            result: None,
            error: Some(error),
            id,
            extra: HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message.into())
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message.into())
    }
}

/// Any JSON-RPC 2.0 message.
///
/// The untagged order matters: serde tries variants top to bottom, and only
/// `Request` has a required discriminating field (`method`), so it must come
/// first; everything without a method falls through to `Response`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(req) => req.id.as_ref(),
            JsonRpcMessage::Response(resp) => resp.id.as_ref(),
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(req) if req.is_notification())
    }

    pub fn is_response(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(req) if !req.is_notification())
    }
}

/// Validate envelope shape beyond what deserialization enforces.
pub fn validate_message(message: &JsonRpcMessage) -> Result<(), crate::error::FleetError> {
    match message {
        JsonRpcMessage::Request(request) => {
            if request.jsonrpc != JSONRPC_VERSION {
                return Err(crate::error::FleetError::InvalidRequest(format!(
                    "expected JSON-RPC version {JSONRPC_VERSION}, got {}",
                    request.jsonrpc
                )));
            }
            if request.method.is_empty() {
                return Err(crate::error::FleetError::InvalidRequest(
                    "method name cannot be empty".to_string(),
                ));
            }
        }
        JsonRpcMessage::Response(response) => {
            if response.jsonrpc != JSONRPC_VERSION {
                return Err(crate::error::FleetError::InvalidRequest(format!(
                    "expected JSON-RPC version {JSONRPC_VERSION}, got {}",
                    response.jsonrpc
                )));
            }
            if response.result.is_some() && response.error.is_some() {
                return Err(crate::error::FleetError::InvalidRequest(
                    "response cannot carry both result and error".to_string(),
                ));
            }
            if response.result.is_none() && response.error.is_none() {
                return Err(crate::error::FleetError::InvalidRequest(
                    "response must carry either result or error".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trip() {
        let request = JsonRpcRequest::new(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"x": 1}})),
            Some(RequestId::Number(7)),
        );

        let serialized = serde_json::to_string(&request).unwrap();
        let deserialized: JsonRpcRequest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let wire = r#"{"jsonrpc":"2.0","id":1,"method":"ping","_meta":{"trace":"abc"}}"#;
        let request: JsonRpcRequest = serde_json::from_str(wire).unwrap();
        assert_eq!(request.extra.get("_meta"), Some(&json!({"trace": "abc"})));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["_meta"]["trace"], "abc");
    }

    #[test]
    fn notification_has_no_id() {
        let notification =
            JsonRpcRequest::notification("notifications/progress", Some(json!({"p": 0.5})));
        assert!(notification.is_notification());
        assert_eq!(notification.id, None);
    }

    #[test]
    fn message_discrimination() {
        let response: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
        assert!(response.is_response());

        let request: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).unwrap();
        assert!(request.is_request());

        let notification: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/x"}"#).unwrap();
        assert!(notification.is_notification());
    }

    #[test]
    fn validation_rejects_result_and_error_together() {
        let mut response = JsonRpcResponse::success(json!({}), Some(RequestId::Number(1)));
        response.error = Some(JsonRpcError::internal_error("boom"));
        let message = JsonRpcMessage::Response(response);
        assert!(validate_message(&message).is_err());
    }

    #[test]
    fn validation_rejects_empty_response() {
        let response = JsonRpcResponse {
            jsonrpc: std::borrow::Cow::Borrowed(JSONRPC_VERSION),
            result: None,
            error: None,
            id: Some(RequestId::Number(1)),
            extra: HashMap::new(),
        };
        assert!(validate_message(&JsonRpcMessage::Response(response)).is_err());
    }

    #[test]
    fn validation_rejects_wrong_version() {
        let mut request = JsonRpcRequest::new("ping", None, Some(RequestId::Number(1)));
        request.jsonrpc = Cow::Borrowed("1.0");
        assert!(validate_message(&JsonRpcMessage::Request(request)).is_err());
    }

    #[test]
    fn string_id_numeric_view() {
        assert_eq!(RequestId::String("41".into()).as_number(), Some(41));
        assert_eq!(RequestId::String("abc".into()).as_number(), None);
        assert_eq!(RequestId::Number(9).as_number(), Some(9));
    }
}
