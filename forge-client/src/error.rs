//! Error types for the Forge engine client

use std::path::PathBuf;

use forge_core::EngineRefError;
use forge_core::dto::rpc::RpcError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while turning an engine reference into a command
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The reference itself is malformed
    #[error("Invalid engine reference: {0}")]
    InvalidReference(#[from] EngineRefError),

    /// The scheme is not one the resolver knows how to execute
    #[error("Unknown engine scheme '{scheme}' in '{engine}'")]
    UnknownScheme { scheme: String, engine: String },

    /// The scheme is known but the engine could not be located under it
    #[error("Engine '{engine}' not found (searched: {})", format_paths(.searched))]
    EngineNotFound {
        engine: String,
        searched: Vec<PathBuf>,
    },
}

/// Errors that can occur while invoking an engine
#[derive(Debug, Error)]
pub enum ClientError {
    /// The engine reference could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The engine process could not be started
    #[error("Failed to spawn engine '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the engine's standard streams failed
    #[error("I/O error talking to engine '{engine}': {source}")]
    Io {
        engine: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine sent something that is not a valid protocol message
    #[error("Protocol error from engine '{engine}': {message}")]
    Protocol { engine: String, message: String },

    /// The engine answered with a JSON-RPC error object
    #[error("Engine '{engine}' rejected '{method}': {error}")]
    Rpc {
        engine: String,
        method: String,
        error: RpcError,
    },

    /// The engine closed its output before answering
    #[error("Engine '{engine}' exited before responding (status: {status}){}", format_stderr(.stderr))]
    ProcessExited {
        engine: String,
        status: String,
        stderr: String,
    },

    /// The tool ran and reported failure
    #[error("Tool '{tool}' of engine '{engine}' failed: {message}{}", format_stderr(.stderr))]
    ToolFailed {
        engine: String,
        tool: String,
        message: String,
        stderr: String,
    },

    /// The caller cancelled the call; the engine was terminated
    #[error("Call to engine '{engine}' was cancelled")]
    Cancelled { engine: String },

    /// The call exceeded its deadline; the engine was terminated
    #[error("Call to engine '{engine}' timed out after {seconds}s")]
    TimedOut { engine: String, seconds: u64 },
}

impl ClientError {
    /// Check if this error comes from cancellation or a deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::TimedOut { .. })
    }

    /// Check if this error is a resolution failure rather than an invocation failure
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolve(_))
    }

    /// Captured engine stderr, when the error carries any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ProcessExited { stderr, .. } | Self::ToolFailed { stderr, .. }
                if !stderr.is_empty() =>
            {
                Some(stderr.as_str())
            }
            _ => None,
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nstderr:\n{}", trimmed)
    }
}
