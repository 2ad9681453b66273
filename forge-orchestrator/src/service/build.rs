//! Build Service
//!
//! Runs a builder only when the lazy-rebuild decision says so and records the
//! resulting artifact.

use std::collections::BTreeMap;
use std::path::Path;

use forge_core::EngineRef;
use forge_core::domain::artifact::{Artifact, ArtifactDependency};
use forge_core::dto::build::BuildInput;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::engine::EngineProvider;
use super::rebuild::{RebuildDecision, RebuildReason, should_rebuild};
use crate::error::Result;
use crate::repository::ArtifactStore;

/// A request to produce one named artifact
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub name: String,
    pub engine: EngineRef,
    pub src: Option<String>,
    pub dest: Option<String>,
    pub spec: BTreeMap<String, Value>,
    /// Bypass the lazy-rebuild decision
    pub force: bool,
}

impl BuildRequest {
    pub fn new(name: impl Into<String>, engine: EngineRef) -> Self {
        Self {
            name: name.into(),
            engine,
            src: None,
            dest: None,
            spec: BTreeMap::new(),
            force: false,
        }
    }

    fn to_input(&self) -> BuildInput {
        BuildInput {
            name: self.name.clone(),
            src: self.src.clone(),
            dest: self.dest.clone(),
            engine: Some(self.engine.to_string()),
            spec: self.spec.clone(),
        }
    }
}

/// What a build request ended up doing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BuildOutcome {
    /// The recorded artifact is still current
    Skipped { artifact: Artifact },
    /// The builder ran and its artifact was recorded
    Built {
        artifact: Artifact,
        reason: String,
    },
}

impl BuildOutcome {
    pub fn artifact(&self) -> &Artifact {
        match self {
            BuildOutcome::Skipped { artifact } | BuildOutcome::Built { artifact, .. } => artifact,
        }
    }

    pub fn was_built(&self) -> bool {
        matches!(self, BuildOutcome::Built { .. })
    }
}

/// Builds an artifact unless its recorded dependencies are unchanged
///
/// # Arguments
/// * `store` - Store holding the previous artifact, updated on success
/// * `engines` - Source of the builder capability
/// * `request` - What to build and with which engine
/// * `force_rebuild` - Global force flag, combined with `request.force`
pub async fn build_artifact(
    store: &ArtifactStore,
    engines: &dyn EngineProvider,
    request: BuildRequest,
    force_rebuild: bool,
) -> Result<BuildOutcome> {
    let snapshot = store.blocking(|s| s.read_or_default()).await?;
    let previous = snapshot.artifacts.get(&request.name);
    let input = request.to_input();

    let decision = if force_rebuild || request.force {
        RebuildDecision::Rebuild(RebuildReason::Forced)
    } else {
        should_rebuild(previous, input.dependency_detector())
    };

    let reason = match decision {
        RebuildDecision::Skip => {
            if let Some(artifact) = previous {
                info!("Artifact '{}' is up to date, skipping build", request.name);
                return Ok(BuildOutcome::Skipped {
                    artifact: artifact.clone(),
                });
            }
            RebuildReason::NoPreviousArtifact
        }
        RebuildDecision::Rebuild(reason) => reason,
    };

    info!(
        "Building '{}' with {} ({})",
        request.name, request.engine, reason
    );

    let builder = engines.builder(&request.engine)?;
    let mut artifact = builder.build(&input).await?;

    if artifact.name != request.name {
        warn!(
            "Engine {} named the artifact '{}', recording it as '{}'",
            request.engine, artifact.name, request.name
        );
        artifact.name = request.name.clone();
    }

    if artifact.dependencies.is_empty() {
        warn!(
            "Artifact '{}' has no recorded dependencies, it will be rebuilt every time",
            artifact.name
        );
    }

    let record = artifact.clone();
    store.blocking(move |s| s.put_artifact(record)).await?;
    info!("Recorded artifact '{}' at {}", artifact.name, artifact.location);

    Ok(BuildOutcome::Built {
        artifact,
        reason: reason.to_string(),
    })
}

/// Asks a detector engine directly for the dependencies of `work_dir`
///
/// Unlike the round-trip performed by builders, failures here are returned
/// to the caller.
pub async fn detect_dependencies(
    engines: &dyn EngineProvider,
    engine: &EngineRef,
    work_dir: &Path,
) -> Result<Vec<ArtifactDependency>> {
    let detector = engines.detector(engine)?;
    Ok(detector.detect_dependencies(work_dir).await?)
}
