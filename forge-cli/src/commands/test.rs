//! Test command handlers

use anyhow::{Context, Result};
use colored::*;
use forge_core::EngineRef;
use forge_orchestrator::Config;
use forge_orchestrator::repository::ArtifactStore;
use forge_orchestrator::service::engine::SubprocessEngineProvider;
use forge_orchestrator::service::test::run_test_stage;
use serde_json::Value;

use super::print_json;

/// Run a test stage and print its report as JSON
///
/// A failed stage is recorded and printed like a passed one, then reported
/// as an error so the exit code reflects it.
pub async fn handle_test(
    config: &Config,
    stage: &str,
    engine: EngineRef,
    spec: Vec<(String, Value)>,
) -> Result<()> {
    let store = ArtifactStore::from_config(config);
    let engines = SubprocessEngineProvider::from_config(config);

    let report = run_test_stage(&store, &engines, &engine, stage, spec.into_iter().collect())
        .await
        .with_context(|| format!("Failed to run test stage '{}'", stage))?;

    print_json(&report)?;

    if report.passed() {
        eprintln!("{} stage {} passed", "✓".green(), stage.bold());
        Ok(())
    } else {
        anyhow::bail!("stage '{}' failed: {}", stage, report.error_message)
    }
}
