//! Command execution shared by the build and test tools

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use forge_core::dto::build::COMMAND_KEY;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Human-readable failure summary including both streams
    pub fn failure_message(&self, argv: &[String]) -> String {
        format!(
            "command `{}` failed with {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            signature(argv),
            self.status,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }
}

/// Reads `spec.command`: an array of strings, or a single string run by `sh -c`
pub fn command_from_spec(spec: &BTreeMap<String, Value>) -> Result<Vec<String>> {
    let argv = match spec.get(COMMAND_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .context("spec.command entries must be strings")
            })
            .collect::<Result<Vec<_>>>()?,
        Some(Value::String(line)) => vec!["sh".to_string(), "-c".to_string(), line.clone()],
        Some(other) => bail!("spec.command must be an array of strings, got {}", other),
        None => bail!("spec.command is required"),
    };

    if argv.first().is_none_or(|program| program.trim().is_empty()) {
        bail!("spec.command cannot be empty");
    }

    Ok(argv)
}

/// The command line as one string, used as an artifact version
pub fn signature(argv: &[String]) -> String {
    argv.join(" ")
}

/// Runs `argv` in `cwd`, capturing both output streams
///
/// The engine's own stdout carries the protocol, so the child never inherits
/// it.
pub async fn run_command(argv: &[String], cwd: &Path) -> Result<CommandOutput> {
    let (program, args) = argv.split_first().context("empty command")?;
    debug!("Running `{}` in {}", signature(argv), cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run `{}` in {}", signature(argv), cwd.display()))?;

    let result = CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    for line in result.stdout.lines().chain(result.stderr.lines()) {
        debug!("  {}", line);
    }
    debug!("`{}` exited with {}", signature(argv), result.status);

    Ok(result)
}
