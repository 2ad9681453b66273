//! JSON-RPC 2.0 envelope
//!
//! Engines speak newline-delimited JSON-RPC 2.0 over their stdin/stdout: one
//! request object per line in, one response object per line out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Handshake method, sent once after spawning an engine
pub const METHOD_INITIALIZE: &str = "initialize";
/// Lists the tools an engine serves
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invokes one tool
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::from(id),
            method: method.into(),
            params,
        }
    }

    /// Checks the request conforms to JSON-RPC 2.0
    pub fn validate(&self) -> Result<(), RpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::new(
                error_codes::INVALID_REQUEST,
                format!("Unsupported JSON-RPC version: {}", self.jsonrpc),
            ));
        }
        Ok(())
    }

    /// Extracts `{name, arguments}` from a `tools/call` request
    pub fn tool_call(&self) -> Result<ToolCallParams, RpcError> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| RpcError::new(error_codes::INVALID_PARAMS, "Missing params"))?;

        serde_json::from_value(params).map_err(|e| {
            RpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call params: {}", e),
            )
        })
    }
}

/// A response carries either `result` or `error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Params of a `tools/call` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Result of the `initialize` handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_defaults_arguments() {
        let req: RpcRequest = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"build"}}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let call = req.tool_call().unwrap();
        assert_eq!(call.name, "build");
        assert_eq!(call.arguments, serde_json::json!({}));
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let mut req = RpcRequest::new(1, METHOD_TOOLS_LIST, None);
        req.jsonrpc = "1.0".to_string();
        let err = req.validate().unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let resp = RpcResponse::error(Value::from(7), RpcError::method_not_found("nope"));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["code"], error_codes::METHOD_NOT_FOUND);
        assert_eq!(json["error"]["data"]["method"], "nope");
    }
}
