//! Engine server
//!
//! Serves the engine side of the stdio protocol: one JSON-RPC request per
//! line on stdin, one response per line on stdout. Tool failures are answered
//! with `isError: true`; only malformed requests and unknown methods produce
//! JSON-RPC errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use forge_core::dto::rpc::{
    EngineInfo, METHOD_INITIALIZE, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, RpcError, RpcRequest,
    RpcResponse, error_codes,
};
use forge_core::dto::tool::ToolResult;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// A tool served by an engine
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool name as used in `tools/call`
    fn name(&self) -> &'static str;

    /// Handles one call
    ///
    /// An `Err` is reported to the caller as a result with `isError: true`.
    async fn call(&self, arguments: Value) -> Result<ToolResult>;
}

/// Dispatches protocol requests to registered tools
pub struct EngineServer {
    name: String,
    version: String,
    tools: BTreeMap<&'static str, Arc<dyn ToolHandler>>,
}

impl EngineServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Registers a tool, replacing any tool with the same name
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.insert(handler.name(), handler);
        self
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            tools: self.tool_names(),
        }
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.keys().map(|k| k.to_string()).collect()
    }

    /// Serves requests until `reader` reaches end of input
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            let Some(response) = self.handle_line(&line).await else {
                continue;
            };

            let mut encoded =
                serde_json::to_vec(&response).context("Failed to encode response")?;
            encoded.push(b'\n');
            writer
                .write_all(&encoded)
                .await
                .context("Failed to write response")?;
            writer.flush().await.context("Failed to flush response")?;
        }

        debug!("Input closed, stopping server");
        Ok(())
    }

    /// Handles one raw request line; blank lines yield no response
    pub async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unparsable request: {}", e);
                let code = if serde_json::from_str::<Value>(line).is_ok() {
                    error_codes::INVALID_REQUEST
                } else {
                    error_codes::PARSE_ERROR
                };
                return Some(RpcResponse::error(
                    Value::Null,
                    RpcError::new(code, format!("Invalid request: {}", e)),
                ));
            }
        };

        Some(self.handle(request).await)
    }

    /// Handles one parsed request
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        if let Err(e) = request.validate() {
            return RpcResponse::error(request.id, e);
        }

        debug!("Handling {} (id {})", request.method, request.id);

        match request.method.as_str() {
            METHOD_INITIALIZE => {
                info!("Initialized {} {}", self.name, self.version);
                respond(request.id, &self.info())
            }
            METHOD_TOOLS_LIST => {
                let tools = serde_json::json!({ "tools": self.tool_names() });
                RpcResponse::success(request.id, tools)
            }
            METHOD_TOOLS_CALL => {
                let call = match request.tool_call() {
                    Ok(call) => call,
                    Err(e) => return RpcResponse::error(request.id, e),
                };
                let result = self.call_tool(&call.name, call.arguments).await;
                respond(request.id, &result)
            }
            other => RpcResponse::error(request.id, RpcError::method_not_found(other)),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(handler) = self.tools.get(name) else {
            warn!("Unknown tool '{}'", name);
            return ToolResult::failure(format!(
                "Unknown tool '{}' (available: {})",
                name,
                self.tool_names().join(", ")
            ));
        };

        match handler.call(arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool '{}' failed: {:#}", name, e);
                ToolResult::failure(format!("{:#}", e))
            }
        }
    }
}

fn respond<T: serde::Serialize>(id: Value, result: &T) -> RpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => RpcResponse::error(
            id,
            RpcError::new(
                error_codes::INTERNAL_ERROR,
                format!("Failed to encode result: {}", e),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn call(&self, arguments: Value) -> Result<ToolResult> {
            if arguments.get("fail").is_some() {
                anyhow::bail!("asked to fail");
            }
            Ok(ToolResult::success("echoed").with_output(arguments))
        }
    }

    fn server() -> EngineServer {
        EngineServer::new("test-engine", "0.0.1").register(Arc::new(Echo))
    }

    async fn call(server: &EngineServer, line: &str) -> RpcResponse {
        server.handle_line(line).await.expect("response")
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = server();

        let init = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await;
        let info: EngineInfo = serde_json::from_value(init.result.unwrap()).unwrap();
        assert_eq!(info.name, "test-engine");
        assert_eq!(info.tools, vec!["echo"]);

        let list = call(&server, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        assert_eq!(list.id, Value::from(2));
        assert_eq!(list.result.unwrap()["tools"][0], "echo");
    }

    #[tokio::test]
    async fn test_tool_errors_are_results() {
        let server = server();

        let ok = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"x":1}}}"#,
        )
        .await;
        let result: ToolResult = serde_json::from_value(ok.result.unwrap()).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.output.unwrap()["x"], 1);

        let failed = call(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"echo","arguments":{"fail":true}}}"#,
        )
        .await;
        assert!(failed.error.is_none());
        let result: ToolResult = serde_json::from_value(failed.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert_eq!(result.message, "asked to fail");

        let unknown = call(
            &server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"deploy"}}"#,
        )
        .await;
        let result: ToolResult = serde_json::from_value(unknown.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert!(result.message.contains("deploy"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server();

        let parse = call(&server, "{ nope").await;
        assert_eq!(parse.error.unwrap().code, error_codes::PARSE_ERROR);

        let invalid = call(&server, r#"{"hello":"world"}"#).await;
        assert_eq!(invalid.error.unwrap().code, error_codes::INVALID_REQUEST);

        let missing = call(&server, r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#).await;
        assert_eq!(missing.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let params = call(&server, r#"{"jsonrpc":"2.0","id":10,"method":"tools/call"}"#).await;
        assert_eq!(params.error.unwrap().code, error_codes::INVALID_PARAMS);

        assert!(server.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let server = server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );

        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<RpcResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].id, Value::from(2));
    }
}
