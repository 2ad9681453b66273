//! Test environment command handlers

use std::collections::BTreeMap;
use std::process::Command;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use forge_core::domain::environment::TestEnvironment;
use forge_orchestrator::Config;
use forge_orchestrator::repository::ArtifactStore;
use forge_orchestrator::service::environment::{
    cleanup_environments, create_environment, delete_environment, list_environments,
};

use super::print_json;

/// Test environment subcommands
#[derive(Subcommand)]
pub enum EnvCommands {
    /// Record a provisioned test environment
    Create {
        /// Environment name (e.g. kind, compose)
        name: String,

        /// Metadata entries as KEY=VALUE
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },
    /// List recorded test environments
    List,
    /// Forget a test environment record
    Delete {
        /// Environment id
        id: String,
    },
    /// Tear down every recorded environment and forget the ones torn down
    Cleanup {
        /// Shell command run once per environment; records are only forgotten
        /// when it exits successfully. Without it, records are simply forgotten.
        #[arg(long)]
        teardown: Option<String>,
    },
}

/// Handle test environment commands
pub fn handle_env_command(command: EnvCommands, config: &Config) -> Result<()> {
    let store = ArtifactStore::from_config(config);

    match command {
        EnvCommands::Create { name, meta } => {
            let env = create_environment(&store, &name, meta.into_iter().collect())
                .with_context(|| format!("Failed to record test environment '{}'", name))?;
            print_json(&env)
        }
        EnvCommands::List => {
            let envs = list_environments(&store).context("Failed to list test environments")?;
            if envs.is_empty() {
                println!("{}", "No test environments found.".yellow());
                return Ok(());
            }

            println!("{}", format!("Found {} test environment(s):", envs.len()).bold());
            println!();
            for env in envs {
                println!("  {} {} {}", "▸".cyan(), env.name.bold(), env.id.dimmed());
                println!("    Created: {}", env.created_at.to_rfc3339());
                for (key, value) in &env.metadata {
                    println!("    {}: {}", key, value);
                }
            }
            Ok(())
        }
        EnvCommands::Delete { id } => {
            let env = delete_environment(&store, &id)
                .with_context(|| format!("Failed to delete test environment '{}'", id))?;
            print_json(&env)
        }
        EnvCommands::Cleanup { teardown } => {
            let report = cleanup_environments(&store, |env| match &teardown {
                Some(command) => run_teardown(command, env),
                None => Ok(()),
            })
            .context("Failed to clean up test environments")?;

            print_json(&report)?;

            if report.is_clean() {
                eprintln!(
                    "{} removed {} environment(s)",
                    "✓".green(),
                    report.removed.len()
                );
                Ok(())
            } else {
                anyhow::bail!(
                    "{} environment(s) could not be torn down",
                    report.failures.len()
                )
            }
        }
    }
}

/// Runs `command` through `sh -c` with the environment described in its
/// variables: `FORGE_ENV_ID`, `FORGE_ENV_NAME` and one `FORGE_ENV_META_<KEY>`
/// per metadata entry.
fn run_teardown(command: &str, env: &TestEnvironment) -> std::result::Result<(), String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("FORGE_ENV_ID", &env.id)
        .env("FORGE_ENV_NAME", &env.name)
        .envs(metadata_vars(&env.metadata))
        .output()
        .map_err(|e| format!("failed to run teardown: {}", e))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(format!("teardown exited with {}", output.status))
    } else {
        Err(format!("teardown exited with {}: {}", output.status, stderr))
    }
}

/// `clusterName` becomes `FORGE_ENV_META_CLUSTERNAME`; characters other than
/// ASCII alphanumerics become `_`
fn metadata_vars(metadata: &BTreeMap<String, String>) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(key, value)| {
            let key: String = key
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            (format!("FORGE_ENV_META_{}", key), value.clone())
        })
        .collect()
}

/// Parse a single KEY=VALUE pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=VALUE: no `=` found in `{}`", s))?;

    if key.trim().is_empty() {
        anyhow::bail!("invalid KEY=VALUE: empty key in `{}`", s);
    }

    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config::default().with_store_path(dir.path().join("store.json"))
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("clusterName=forge-e2e").unwrap(),
            ("clusterName".to_string(), "forge-e2e".to_string())
        );
        assert_eq!(
            parse_key_val("kubeconfig=a=b").unwrap(),
            ("kubeconfig".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_metadata_vars() {
        let metadata = BTreeMap::from([("cluster-name".to_string(), "e2e".to_string())]);
        assert_eq!(
            metadata_vars(&metadata),
            vec![("FORGE_ENV_META_CLUSTER_NAME".to_string(), "e2e".to_string())]
        );
    }

    #[test]
    fn test_create_then_cleanup_without_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        handle_env_command(
            EnvCommands::Create {
                name: "kind".to_string(),
                meta: vec![("clusterName".to_string(), "forge-e2e".to_string())],
            },
            &config,
        )
        .unwrap();
        let store = ArtifactStore::from_config(&config);
        assert_eq!(list_environments(&store).unwrap().len(), 1);

        handle_env_command(EnvCommands::Cleanup { teardown: None }, &config).unwrap();
        assert!(list_environments(&store).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_keeps_environments_whose_teardown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let store = ArtifactStore::from_config(&config);

        let good = create_environment(
            &store,
            "good",
            BTreeMap::from([("cluster".to_string(), "ok".to_string())]),
        )
        .unwrap();
        let bad = create_environment(
            &store,
            "bad",
            BTreeMap::from([("cluster".to_string(), "stuck".to_string())]),
        )
        .unwrap();

        let teardown = r#"[ "$FORGE_ENV_META_CLUSTER" = ok ] || { echo "cluster $FORGE_ENV_NAME busy" >&2; exit 4; }"#;
        let err = handle_env_command(
            EnvCommands::Cleanup {
                teardown: Some(teardown.to_string()),
            },
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 environment(s)"));

        let remaining = list_environments(&store).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bad.id);
        assert_ne!(remaining[0].id, good.id);

        let failure = run_teardown(teardown, &remaining[0]).unwrap_err();
        assert!(failure.contains("cluster bad busy"));
    }
}
