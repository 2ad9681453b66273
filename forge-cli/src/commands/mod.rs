//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod artifact;
mod build;
mod env;
mod report;
mod test;

pub use artifact::ArtifactCommands;
pub use env::EnvCommands;
pub use report::ReportCommands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use forge_core::EngineRef;
use serde::Serialize;
use serde_json::Value;

use forge_orchestrator::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build an artifact unless its dependencies are unchanged
    Build {
        /// Artifact name
        name: String,

        /// Builder engine (e.g. go://build-go@v0.3.0, bin://forge-engine)
        #[arg(short, long)]
        engine: EngineRef,

        /// Source directory passed to the engine
        #[arg(long)]
        src: Option<String>,

        /// Destination passed to the engine
        #[arg(long)]
        dest: Option<String>,

        /// Engine spec entries as KEY=JSON (plain strings need no quotes)
        #[arg(long = "spec", value_parser = parse_spec_entry)]
        spec: Vec<(String, Value)>,
    },
    /// Run a test stage and record its report
    Test {
        /// Stage name (e.g. unit, integration, e2e)
        stage: String,

        /// Test-runner engine
        #[arg(short, long)]
        engine: EngineRef,

        /// Engine spec entries as KEY=JSON
        #[arg(long = "spec", value_parser = parse_spec_entry)]
        spec: Vec<(String, Value)>,
    },
    /// Ask a detector engine for the dependencies of a directory
    Detect {
        /// Detector engine
        #[arg(short, long)]
        engine: EngineRef,

        /// Directory to inspect
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Test report management
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Artifact inspection
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommands,
    },
    /// Test environment management
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The loaded configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Build {
            name,
            engine,
            src,
            dest,
            spec,
        } => build::handle_build(config, name, engine, src, dest, spec).await,
        Commands::Test {
            stage,
            engine,
            spec,
        } => test::handle_test(config, &stage, engine, spec).await,
        Commands::Detect { engine, dir } => build::handle_detect(config, engine, &dir).await,
        Commands::Report { command } => report::handle_report_command(command, config),
        Commands::Artifact { command } => artifact::handle_artifact_command(command, config),
        Commands::Env { command } => env::handle_env_command(command, config),
    }
}

/// Parse a single KEY=JSON spec entry
///
/// Values that are not valid JSON are taken as plain strings.
fn parse_spec_entry(s: &str) -> Result<(String, Value)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=JSON: no `=` found in `{}`", s))?;

    if key.trim().is_empty() {
        anyhow::bail!("invalid KEY=JSON: empty key in `{}`", s);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

/// Print a value as pretty JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}
