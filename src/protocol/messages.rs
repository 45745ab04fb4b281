//! MCP JSON-RPC message types

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Content, Info, ServerCapabilities, Tool};
use crate::error::rpc_codes;

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
}

/// Request ID (string or number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID
    Number(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed request or notification
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// `None` for notifications
    pub id: Option<RequestId>,
    /// Method name
    pub method: String,
    /// Parameters
    pub params: Option<Value>,
}

/// Extract a `RequestId` from a JSON value.
///
/// Supports string and integer ID values per JSON-RPC 2.0.
#[must_use]
pub fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(RequestId::Number(i))
            } else {
                #[allow(clippy::cast_possible_wrap)]
                n.as_u64().map(|u| RequestId::Number(u as i64))
            }
        }
        _ => None,
    }
}

/// Check whether a method name represents a notification (no response expected).
#[must_use]
pub fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse a JSON-RPC request or notification.
#[allow(clippy::result_large_err)] // JsonRpcResponse is sent back as-is
pub fn parse_request(value: &Value) -> std::result::Result<IncomingMessage, JsonRpcResponse> {
    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method")
        })?;

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Missing id",
        ));
    }

    Ok(IncomingMessage {
        id,
        method: method.to_string(),
        params: value.get("params").cloned(),
    })
}

// ============================================================================
// Initialize
// ============================================================================

/// Initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Server info
    #[serde(rename = "serverInfo")]
    pub server_info: Info,
    /// Optional instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// Tools
// ============================================================================

/// Tools list result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// List of tools
    pub tools: Vec<Tool>,
}

/// Tools call request params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallParams {
    /// Tool name
    #[serde(default)]
    pub name: String,
    /// Tool arguments
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

impl ToolsCallParams {
    /// Read `tools/call` params; absent fields become `""` / `{}`
    #[must_use]
    pub fn from_params(params: Option<&Value>) -> Self {
        params
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_else(|| Self {
                name: String::new(),
                arguments: empty_object(),
            })
    }
}

fn empty_object() -> Value {
    json!({})
}

/// Tools call result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallResult {
    /// Content items
    pub content: Vec<Content>,
    /// Whether result is an error
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_request_id_accepts_strings_and_integers() {
        assert_eq!(
            extract_request_id(&json!("abc-123")),
            Some(RequestId::String("abc-123".to_string()))
        );
        assert_eq!(extract_request_id(&json!(-7)), Some(RequestId::Number(-7)));
        assert_eq!(extract_request_id(&json!(0)), Some(RequestId::Number(0)));
    }

    #[test]
    fn extract_request_id_rejects_other_types() {
        assert_eq!(extract_request_id(&json!(null)), None);
        assert_eq!(extract_request_id(&json!(true)), None);
        assert_eq!(extract_request_id(&json!(1.5)), None);
        assert_eq!(extract_request_id(&json!([1])), None);
    }

    #[test]
    fn parse_request_valid() {
        let msg = parse_request(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/list"
        }))
        .unwrap();
        assert_eq!(msg.id, Some(RequestId::Number(1)));
        assert_eq!(msg.method, "tools/list");
        assert_eq!(msg.params, None);
    }

    #[test]
    fn parse_request_notification_without_id() {
        let msg = parse_request(&json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        assert_eq!(msg.id, None);
    }

    #[test]
    fn parse_request_rejects_bad_envelopes() {
        let wrong_version = parse_request(&json!({"jsonrpc": "1.0", "id": 1, "method": "x"}));
        assert_eq!(
            wrong_version.unwrap_err().error.unwrap().code,
            rpc_codes::INVALID_REQUEST
        );

        let missing_id = parse_request(&json!({"jsonrpc": "2.0", "method": "tools/list"}));
        assert_eq!(missing_id.unwrap_err().error.unwrap().message, "Missing id");

        let missing_method = parse_request(&json!({"jsonrpc": "2.0", "id": "a"}));
        let err = missing_method.unwrap_err();
        assert_eq!(err.id, Some(RequestId::String("a".to_string())));
        assert_eq!(err.error.unwrap().message, "Missing method");
    }

    #[test]
    fn tools_call_params_default_missing_fields() {
        let params = ToolsCallParams::from_params(None);
        assert_eq!(params.name, "");
        assert_eq!(params.arguments, json!({}));

        let params = ToolsCallParams::from_params(Some(&json!({"name": "datocms_roles"})));
        assert_eq!(params.name, "datocms_roles");
        assert_eq!(params.arguments, json!({}));
    }

    #[test]
    fn tools_call_result_serializes_is_error() {
        let result = ToolsCallResult {
            content: vec![Content::text("hi")],
            is_error: true,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"content": [{"type": "text", "text": "hi"}], "isError": true})
        );
    }
}
