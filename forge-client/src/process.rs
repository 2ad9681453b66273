//! Engine subprocess
//!
//! A spawned engine speaking newline-delimited JSON-RPC over its standard
//! streams. The process is long-lived: one handshake, then any number of tool
//! calls, each awaited to completion before the next is sent.

use std::future::Future;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forge_core::dto::rpc::{
    EngineInfo, METHOD_INITIALIZE, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, RpcRequest, RpcResponse,
};
use forge_core::dto::tool::ToolResult;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::resolver::ResolvedEngine;

/// Upper bound on retained stderr, in bytes
const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// Time given to an engine to exit after its stdin is closed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Longest wait for stderr to catch up before reporting a tool failure
const STDERR_SETTLE: Duration = Duration::from_millis(100);

/// Interval between stderr size checks while settling
const STDERR_POLL: Duration = Duration::from_millis(10);

/// A running engine
pub struct EngineProcess {
    /// Label used in logs and errors (the engine reference or command line)
    label: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
    next_id: u64,
    timeout: Duration,
    info: EngineInfo,
}

enum Exchange {
    Done(std::result::Result<Value, ExchangeError>),
    TimedOut,
    Cancelled,
}

enum ExchangeError {
    Closed,
    Client(ClientError),
}

impl EngineProcess {
    /// Spawns an engine and performs the `initialize` handshake
    ///
    /// # Arguments
    /// * `label` - Name used in logs and errors
    /// * `engine` - The resolved command line
    /// * `timeout` - Deadline applied to every request, including the handshake
    pub async fn spawn(
        label: impl Into<String>,
        engine: &ResolvedEngine,
        timeout: Duration,
    ) -> Result<Self> {
        Self::spawn_until(label, engine, timeout, std::future::pending()).await
    }

    /// Like [`spawn`](Self::spawn), aborting the handshake when `cancel` completes
    ///
    /// Engines built on first use (`go run`) may take long to answer the
    /// handshake; on cancellation the engine is killed and
    /// [`ClientError::Cancelled`] is returned.
    pub async fn spawn_until<F: Future<Output = ()>>(
        label: impl Into<String>,
        engine: &ResolvedEngine,
        timeout: Duration,
        cancel: F,
    ) -> Result<Self> {
        let label = label.into();
        debug!("Spawning engine {}: {}", label, engine);

        let mut child = Command::new(&engine.command)
            .args(&engine.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClientError::Spawn {
                command: engine.to_string(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| ClientError::Protocol {
            engine: label.clone(),
            message: "engine stdout is not available".to_string(),
        })?;

        let stderr = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|pipe| {
            let buffer = stderr.clone();
            let label = label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(engine = %label, "{}", line);
                    let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if buffer.len() > STDERR_TAIL_BYTES {
                        let mut cut = buffer.len() - STDERR_TAIL_BYTES;
                        while !buffer.is_char_boundary(cut) {
                            cut += 1;
                        }
                        buffer.drain(..cut);
                    }
                }
            })
        });

        let mut process = Self {
            label,
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr,
            stderr_task,
            next_id: 1,
            timeout,
            info: EngineInfo::default(),
        };

        let params = serde_json::json!({
            "clientInfo": { "name": "forge", "version": env!("CARGO_PKG_VERSION") }
        });
        let result = process
            .request(METHOD_INITIALIZE, Some(params), cancel)
            .await?;
        process.info = serde_json::from_value(result).map_err(|e| ClientError::Protocol {
            engine: process.label.clone(),
            message: format!("invalid initialize result: {}", e),
        })?;

        debug!(
            "Engine {} ready: {} {} (tools: {:?})",
            process.label, process.info.name, process.info.version, process.info.tools
        );

        Ok(process)
    }

    /// Information the engine reported during the handshake
    pub fn info(&self) -> &EngineInfo {
        &self.info
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stderr captured so far (bounded tail)
    pub fn stderr(&self) -> String {
        self.stderr.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Lists the tools the engine serves
    pub async fn list_tools(&mut self) -> Result<Vec<String>> {
        let result = self
            .request(METHOD_TOOLS_LIST, None, std::future::pending())
            .await?;
        let tools = result
            .get("tools")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(tools).map_err(|e| ClientError::Protocol {
            engine: self.label.clone(),
            message: format!("invalid tools/list result: {}", e),
        })
    }

    /// Calls a tool under the process deadline
    ///
    /// A result flagged `isError` is returned as [`ClientError::ToolFailed`].
    pub async fn call_tool<I: Serialize>(&mut self, tool: &str, input: &I) -> Result<ToolResult> {
        self.call_tool_until(tool, input, std::future::pending())
            .await
    }

    /// Calls a tool, aborting when `cancel` completes
    ///
    /// On cancellation the engine is killed and [`ClientError::Cancelled`] is
    /// returned; the process cannot be used afterwards.
    pub async fn call_tool_until<I, F>(
        &mut self,
        tool: &str,
        input: &I,
        cancel: F,
    ) -> Result<ToolResult>
    where
        I: Serialize,
        F: Future<Output = ()>,
    {
        let arguments = serde_json::to_value(input).map_err(|e| ClientError::Protocol {
            engine: self.label.clone(),
            message: format!("failed to encode input for tool '{}': {}", tool, e),
        })?;
        let params = serde_json::json!({ "name": tool, "arguments": arguments });

        let result = self.request(METHOD_TOOLS_CALL, Some(params), cancel).await?;
        let result: ToolResult =
            serde_json::from_value(result).map_err(|e| ClientError::Protocol {
                engine: self.label.clone(),
                message: format!("invalid result for tool '{}': {}", tool, e),
            })?;

        if result.is_error {
            self.settle_stderr().await;
            return Err(ClientError::ToolFailed {
                engine: self.label.clone(),
                tool: tool.to_string(),
                message: result.message,
                stderr: self.stderr(),
            });
        }

        Ok(result)
    }

    /// Closes the engine's stdin and waits for it to exit
    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.stdin.take());

        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Engine {} exited with {}", self.label, status);
            }
            Ok(Err(e)) => {
                return Err(ClientError::Io {
                    engine: self.label.clone(),
                    source: e,
                });
            }
            Err(_) => {
                warn!(
                    "Engine {} did not exit within {:?}, killing it",
                    self.label, SHUTDOWN_GRACE
                );
                self.kill().await;
            }
        }

        Ok(())
    }

    async fn request<F: Future<Output = ()>>(
        &mut self,
        method: &str,
        params: Option<Value>,
        cancel: F,
    ) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = RpcRequest::new(id, method, params);
        let mut line = serde_json::to_string(&request).map_err(|e| ClientError::Protocol {
            engine: self.label.clone(),
            message: format!("failed to encode request: {}", e),
        })?;
        line.push('\n');

        let outcome = {
            let exchange = Self::exchange(
                &self.label,
                &mut self.stdin,
                &mut self.stdout,
                &line,
                id,
                method,
            );
            tokio::select! {
                res = tokio::time::timeout(self.timeout, exchange) => match res {
                    Ok(done) => Exchange::Done(done),
                    Err(_) => Exchange::TimedOut,
                },
                _ = cancel => Exchange::Cancelled,
            }
        };

        match outcome {
            Exchange::Done(Ok(value)) => Ok(value),
            Exchange::Done(Err(ExchangeError::Client(err))) => Err(err),
            Exchange::Done(Err(ExchangeError::Closed)) => {
                let status = self.wait_exit().await;
                Err(ClientError::ProcessExited {
                    engine: self.label.clone(),
                    status,
                    stderr: self.stderr(),
                })
            }
            Exchange::TimedOut => {
                warn!(
                    "Engine {} did not answer '{}' within {:?}, killing it",
                    self.label, method, self.timeout
                );
                self.kill().await;
                Err(ClientError::TimedOut {
                    engine: self.label.clone(),
                    seconds: self.timeout.as_secs(),
                })
            }
            Exchange::Cancelled => {
                warn!("Call '{}' to engine {} cancelled, killing it", method, self.label);
                self.kill().await;
                Err(ClientError::Cancelled {
                    engine: self.label.clone(),
                })
            }
        }
    }

    /// Writes one request line and reads lines until the matching response
    async fn exchange(
        label: &str,
        stdin: &mut Option<ChildStdin>,
        stdout: &mut Lines<BufReader<ChildStdout>>,
        line: &str,
        id: u64,
        method: &str,
    ) -> std::result::Result<Value, ExchangeError> {
        let writer = stdin.as_mut().ok_or(ExchangeError::Closed)?;
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            return Err(if e.kind() == std::io::ErrorKind::BrokenPipe {
                ExchangeError::Closed
            } else {
                ExchangeError::Client(ClientError::Io {
                    engine: label.to_string(),
                    source: e,
                })
            });
        }
        if writer.flush().await.is_err() {
            return Err(ExchangeError::Closed);
        }

        let expected_id = Value::from(id);
        loop {
            let raw = match stdout.next_line().await {
                Ok(Some(raw)) => raw,
                Ok(None) => return Err(ExchangeError::Closed),
                Err(e) => {
                    return Err(ExchangeError::Client(ClientError::Io {
                        engine: label.to_string(),
                        source: e,
                    }));
                }
            };

            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: RpcResponse = match serde_json::from_str(trimmed) {
                Ok(response) => response,
                Err(_) => {
                    warn!("Skipping non-protocol output from engine {}: {}", label, trimmed);
                    continue;
                }
            };

            if response.id != expected_id {
                warn!(
                    "Skipping response with unexpected id {} from engine {} (waiting for {})",
                    response.id, label, id
                );
                continue;
            }

            if let Some(error) = response.error {
                return Err(ExchangeError::Client(ClientError::Rpc {
                    engine: label.to_string(),
                    method: method.to_string(),
                    error,
                }));
            }

            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    /// Waits briefly for an engine that closed its stdout, draining stderr
    async fn wait_exit(&mut self) -> String {
        drop(self.stdin.take());

        let status = match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => status.to_string(),
            Ok(Err(e)) => format!("unknown ({})", e),
            Err(_) => {
                self.kill().await;
                "killed".to_string()
            }
        };

        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }

        status
    }

    /// Gives the stderr reader a bounded window to catch up
    ///
    /// Stderr is read by a separate task, so lines written just before a
    /// response may not be buffered yet. Returns once the buffer stops growing
    /// for one poll interval, the reader finishes, or [`STDERR_SETTLE`] elapses.
    async fn settle_stderr(&self) {
        let Some(task) = self.stderr_task.as_ref() else {
            return;
        };

        let deadline = tokio::time::Instant::now() + STDERR_SETTLE;
        let mut seen = self.stderr_len();
        let mut grew = false;

        while tokio::time::Instant::now() < deadline && !task.is_finished() {
            tokio::time::sleep(STDERR_POLL).await;
            let len = self.stderr_len();
            if len == seen && (grew || len > 0) {
                break;
            }
            grew |= len != seen;
            seen = len;
        }
    }

    fn stderr_len(&self) -> usize {
        self.stderr.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn kill(&mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill().await {
            debug!("Failed to kill engine {}: {}", self.label, e);
        }
    }
}
