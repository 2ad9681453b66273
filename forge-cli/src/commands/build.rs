//! Build command handlers

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use forge_core::EngineRef;
use forge_orchestrator::Config;
use forge_orchestrator::repository::ArtifactStore;
use forge_orchestrator::service::build::{
    BuildOutcome, BuildRequest, build_artifact, detect_dependencies,
};
use forge_orchestrator::service::engine::SubprocessEngineProvider;
use serde_json::Value;

use super::print_json;

/// Build one artifact and print the outcome as JSON
pub async fn handle_build(
    config: &Config,
    name: String,
    engine: EngineRef,
    src: Option<String>,
    dest: Option<String>,
    spec: Vec<(String, Value)>,
) -> Result<()> {
    let store = ArtifactStore::from_config(config);
    let engines = SubprocessEngineProvider::from_config(config);

    let mut request = BuildRequest::new(&name, engine);
    request.src = src;
    request.dest = dest;
    request.spec = spec.into_iter().collect();

    let outcome = build_artifact(&store, &engines, request, config.force_rebuild)
        .await
        .with_context(|| format!("Failed to build '{}'", name))?;

    match &outcome {
        BuildOutcome::Skipped { .. } => {
            eprintln!("{} {} is up to date", "✓".green(), name.bold());
        }
        BuildOutcome::Built { reason, .. } => {
            eprintln!("{} built {} ({})", "✓".green(), name.bold(), reason.dimmed());
        }
    }

    print_json(&outcome)
}

/// Run a detector directly and print the dependencies as JSON
pub async fn handle_detect(config: &Config, engine: EngineRef, dir: &Path) -> Result<()> {
    let engines = SubprocessEngineProvider::from_config(config);
    let dir = std::path::absolute(dir).context("Failed to resolve directory")?;

    let dependencies = detect_dependencies(&engines, &engine, &dir)
        .await
        .with_context(|| format!("Dependency detection with {} failed", engine))?;

    print_json(&dependencies)
}
