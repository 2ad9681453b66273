//! `detectDependencies` tool
//!
//! Reports every regular file under the work directory, with its mtime.

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::domain::artifact::ArtifactDependency;
use forge_core::dto::detect::{
    DETECT_DEPENDENCIES_TOOL, DetectDependenciesInput, DetectDependenciesOutput,
};
use forge_core::dto::tool::ToolResult;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::server::ToolHandler;

pub struct DetectTool {
    skip_dirs: Vec<String>,
}

impl DetectTool {
    pub fn new(skip_dirs: Vec<String>) -> Self {
        Self { skip_dirs }
    }

    /// Walks `root` and snapshots every file found
    pub fn scan(&self, root: &Path) -> Result<Vec<ArtifactDependency>> {
        let root = std::path::absolute(root).context("Failed to resolve workDir")?;
        if !root.is_dir() {
            bail!("workDir {} is not a directory", root.display());
        }

        let mut dependencies = Vec::new();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_skipped(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let modified = entry
                .metadata()
                .context("Failed to read metadata")
                .and_then(|m| m.modified().context("mtime unavailable"));
            match modified {
                Ok(mtime) => {
                    let timestamp: DateTime<Utc> = mtime.into();
                    dependencies.push(ArtifactDependency::file(entry.path(), timestamp));
                }
                Err(e) => warn!("Skipping {}: {:#}", entry.path().display(), e),
            }
        }

        debug!("Detected {} files under {}", dependencies.len(), root.display());
        Ok(dependencies)
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.skip_dirs.iter().any(|skip| *skip == name)
    }
}

#[async_trait]
impl ToolHandler for DetectTool {
    fn name(&self) -> &'static str {
        DETECT_DEPENDENCIES_TOOL
    }

    async fn call(&self, arguments: Value) -> Result<ToolResult> {
        let input: DetectDependenciesInput =
            serde_json::from_value(arguments).context("Invalid detectDependencies input")?;

        let dependencies = self.scan(Path::new(&input.work_dir))?;
        let message = format!("Detected {} dependencies", dependencies.len());
        let output = serde_json::to_value(DetectDependenciesOutput { dependencies })
            .context("Failed to encode dependencies")?;

        Ok(ToolResult::success(message).with_output(output))
    }
}
