//! Artifact command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use forge_orchestrator::Config;
use forge_orchestrator::repository::{ArtifactStore, get_artifact};

use super::print_json;

/// Artifact subcommands
#[derive(Subcommand)]
pub enum ArtifactCommands {
    /// Print one artifact as JSON
    Get {
        /// Artifact name
        name: String,
    },
    /// List recorded artifacts
    List,
}

/// Handle artifact commands
pub fn handle_artifact_command(command: ArtifactCommands, config: &Config) -> Result<()> {
    let store = ArtifactStore::from_config(config);
    let doc = store.read_or_default().context("Failed to read artifact store")?;

    match command {
        ArtifactCommands::Get { name } => print_json(get_artifact(&doc, &name)?),
        ArtifactCommands::List => {
            if doc.artifacts.is_empty() {
                println!("{}", "No artifacts found.".yellow());
                return Ok(());
            }

            println!("{}", format!("Found {} artifact(s):", doc.artifacts.len()).bold());
            println!();
            for artifact in doc.artifacts.values() {
                println!(
                    "  {} {} {}",
                    "▸".cyan(),
                    artifact.name.bold(),
                    format!("[{}]", artifact.kind).dimmed()
                );
                println!("    Location:     {}", artifact.location);
                println!("    Version:      {}", artifact.version);
                println!("    Built:        {}", artifact.timestamp.to_rfc3339());
                if artifact.dependency_detector_engine.is_empty() {
                    println!("    Dependencies: {}", "none (always rebuilt)".yellow());
                } else {
                    println!(
                        "    Dependencies: {} via {}",
                        artifact.dependencies.len(),
                        artifact.dependency_detector_engine
                    );
                }
            }
            Ok(())
        }
    }
}
