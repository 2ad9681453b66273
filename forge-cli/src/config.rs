//! Configuration module
//!
//! Builds the orchestrator configuration from the environment and applies
//! command-line overrides on top.

use std::path::PathBuf;

use anyhow::{Context, Result};
use forge_orchestrator::Config;

/// Loads and validates the configuration
///
/// # Arguments
/// * `store_path` - `--store-path`, overriding `FORGE_STORE_PATH`
/// * `force` - `--force`, combined with `FORGE_FORCE_REBUILD`
pub fn load_config(store_path: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::from_env();

    if let Some(path) = store_path {
        config = config.with_store_path(path);
    }
    if force {
        config = config.with_force_rebuild(true);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
