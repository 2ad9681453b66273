//! `build` tool
//!
//! Runs `spec.command` in the source directory, then asks the configured
//! detector which files the result depends on.

use anyhow::{Context, Result};
use async_trait::async_trait;
use forge_client::EngineClient;
use forge_client::detect::attach_dependencies;
use forge_core::domain::artifact::Artifact;
use forge_core::dto::build::{BUILD_TOOL, BuildInput};
use forge_core::dto::tool::ToolResult;
use serde_json::Value;
use tracing::info;

use super::command::{command_from_spec, run_command, signature};
use crate::server::ToolHandler;

/// Artifact type produced by this tool
pub const ARTIFACT_KIND: &str = "command-output";

pub struct BuildTool {
    client: EngineClient,
    default_detector: String,
}

impl BuildTool {
    /// Create a new build tool
    ///
    /// # Arguments
    /// * `client` - Client used for the detector round-trip
    /// * `default_detector` - Detector used when the build spec names none
    pub fn new(client: EngineClient, default_detector: impl Into<String>) -> Self {
        Self {
            client,
            default_detector: default_detector.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for BuildTool {
    fn name(&self) -> &'static str {
        BUILD_TOOL
    }

    async fn call(&self, arguments: Value) -> Result<ToolResult> {
        let input: BuildInput =
            serde_json::from_value(arguments).context("Invalid build input")?;
        let argv = command_from_spec(&input.spec)?;

        let src = std::path::absolute(input.src.as_deref().unwrap_or("."))
            .context("Failed to resolve source directory")?;

        let output = run_command(&argv, &src).await?;
        if !output.success() {
            return Ok(ToolResult::failure(output.failure_message(&argv)));
        }

        let location = match input.dest.as_deref() {
            Some(dest) => std::path::absolute(dest).context("Failed to resolve destination")?,
            None => src.clone(),
        };

        let artifact = Artifact::new(
            &input.name,
            ARTIFACT_KIND,
            location.display().to_string(),
            signature(&argv),
        );

        let detector = input
            .dependency_detector()
            .unwrap_or(self.default_detector.as_str());
        let artifact = attach_dependencies(&self.client, artifact, detector, &src).await;

        info!(
            "Built '{}' with {} dependencies",
            artifact.name,
            artifact.dependencies.len()
        );

        Ok(ToolResult::success(format!("Built {}", artifact.name)).with_artifact(artifact))
    }
}
