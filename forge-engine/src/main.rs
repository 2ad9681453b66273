//! Forge Engine binary
//!
//! Serves the reference tools over stdin/stdout until stdin closes. Logs go
//! to stderr; stdout carries protocol responses only.

use anyhow::{Context, Result};
use tokio::io::{BufReader, stdin, stdout};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge_engine::config::Config;
use forge_engine::reference_server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_engine=info,forge_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    config.validate().context("Invalid engine configuration")?;

    info!("Starting {} {}", config.name, config.version);

    let server = reference_server(&config);
    server
        .serve(BufReader::new(stdin()), stdout())
        .await
        .context("Engine server failed")?;

    info!("Engine stopped");
    Ok(())
}
