//! Forge CLI
//!
//! Command-line interface for building artifacts, running test stages and
//! inspecting the artifact store.

mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Forge build orchestrator", long_about = None)]
struct Cli {
    /// Path of the artifact store
    #[arg(long, global = true, env = "FORGE_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Rebuild even when recorded dependencies are unchanged
    #[arg(long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match config::load_config(cli.store_path, cli.force) {
        Ok(config) => handle_command(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
