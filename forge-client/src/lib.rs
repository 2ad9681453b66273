//! Forge Engine Client
//!
//! The orchestrator side of the engine invocation protocol.
//!
//! An engine is any executable that speaks newline-delimited JSON-RPC over its
//! standard streams. This crate resolves engine references to command lines
//! ([`Resolver`]), drives engine subprocesses ([`EngineProcess`]) and provides
//! the dependency-detection round-trip used by builders ([`detect`]).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use forge_client::{EngineClient, Resolver, ResolverConfig};
//! use forge_core::dto::detect::DetectDependenciesInput;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), forge_client::ClientError> {
//!     let resolver = Arc::new(Resolver::new(ResolverConfig::from_env()));
//!     let client = EngineClient::new(resolver, Duration::from_secs(60));
//!
//!     let engine = "bin://forge-engine".parse().unwrap();
//!     let input = DetectDependenciesInput { work_dir: "/repo".to_string() };
//!     let result = client.invoke(&engine, "detectDependencies", &input).await?;
//!
//!     println!("{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod detect;
pub mod error;
mod process;
mod resolver;

pub use error::{ClientError, ResolveError, Result};
pub use process::EngineProcess;
pub use resolver::{
    BUILD_VERSION, DEFAULT_ENGINE_VERSION, DEFAULT_GO_MODULE, ResolvedEngine, Resolver,
    ResolverConfig,
};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use forge_core::EngineRef;
use forge_core::dto::tool::ToolResult;
use serde::Serialize;
use tracing::debug;

/// Default deadline for one engine call
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(600);

/// Resolves engines and runs one-shot tool calls against them
#[derive(Debug, Clone)]
pub struct EngineClient {
    resolver: Arc<Resolver>,
    timeout: Duration,
}

impl EngineClient {
    /// Create a new engine client
    ///
    /// # Arguments
    /// * `resolver` - Shared resolver (its cache is shared with other clients)
    /// * `timeout` - Deadline applied to each request sent to an engine
    pub fn new(resolver: Arc<Resolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves and spawns an engine, returning the live process
    pub async fn connect(&self, engine: &EngineRef) -> Result<EngineProcess> {
        self.connect_until(engine, std::future::pending()).await
    }

    /// Like [`connect`](Self::connect), aborting startup when `cancel` completes
    pub async fn connect_until<F: Future<Output = ()>>(
        &self,
        engine: &EngineRef,
        cancel: F,
    ) -> Result<EngineProcess> {
        let resolved = self.resolver.resolve(engine, BUILD_VERSION)?;
        EngineProcess::spawn_until(engine.to_string(), &resolved, self.timeout, cancel).await
    }

    /// Spawns an engine, calls one tool and shuts the engine down
    pub async fn invoke<I: Serialize>(
        &self,
        engine: &EngineRef,
        tool: &str,
        input: &I,
    ) -> Result<ToolResult> {
        self.invoke_until(engine, tool, input, std::future::pending())
            .await
    }

    /// Like [`invoke`](Self::invoke), aborting when `cancel` completes
    ///
    /// `cancel` covers the whole call, including engine startup.
    pub async fn invoke_until<I, F>(
        &self,
        engine: &EngineRef,
        tool: &str,
        input: &I,
        cancel: F,
    ) -> Result<ToolResult>
    where
        I: Serialize,
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let mut process = self.connect_until(engine, cancel.as_mut()).await?;
        debug!("Calling tool '{}' on engine {}", tool, engine);

        let result = process.call_tool_until(tool, input, cancel).await;
        match result {
            Ok(result) => {
                process.shutdown().await?;
                Ok(result)
            }
            // The process is dropped here, which kills it.
            Err(e) => Err(e),
        }
    }
}
