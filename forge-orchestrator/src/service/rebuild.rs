//! Lazy-rebuild decision
//!
//! Compares the modification time of every recorded dependency against the
//! timestamp captured when the artifact was built. Only local files are
//! tracked; anything else an artifact depends on is invisible here.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Timelike, Utc};
use forge_core::domain::artifact::Artifact;
use tracing::debug;

/// Whether an artifact has to be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildDecision {
    Skip,
    Rebuild(RebuildReason),
}

impl RebuildDecision {
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, RebuildDecision::Rebuild(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    NoPreviousArtifact,
    NoDependencies,
    DependencyMissing(PathBuf),
    DependencyModified(PathBuf),
    DetectorChanged { recorded: String, candidate: String },
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::NoPreviousArtifact => write!(f, "no previous artifact"),
            RebuildReason::NoDependencies => write!(f, "no recorded dependencies"),
            RebuildReason::DependencyMissing(path) => {
                write!(f, "dependency {} is missing", path.display())
            }
            RebuildReason::DependencyModified(path) => {
                write!(f, "dependency {} was modified", path.display())
            }
            RebuildReason::DetectorChanged {
                recorded,
                candidate,
            } => write!(f, "dependency detector changed from {} to {}", recorded, candidate),
            RebuildReason::Forced => write!(f, "rebuild forced"),
        }
    }
}

/// Decides whether `previous` must be rebuilt
///
/// # Arguments
/// * `previous` - The artifact recorded by the last successful build, if any
/// * `candidate_detector` - The detector the next build would use; `None` skips
///   the detector comparison
pub fn should_rebuild(
    previous: Option<&Artifact>,
    candidate_detector: Option<&str>,
) -> RebuildDecision {
    let Some(artifact) = previous else {
        return RebuildDecision::Rebuild(RebuildReason::NoPreviousArtifact);
    };

    if let Some(candidate) = candidate_detector.map(str::trim).filter(|c| !c.is_empty()) {
        let recorded = artifact.dependency_detector_engine.as_str();
        if !recorded.is_empty() && recorded != candidate {
            return RebuildDecision::Rebuild(RebuildReason::DetectorChanged {
                recorded: recorded.to_string(),
                candidate: candidate.to_string(),
            });
        }
    }

    if artifact.dependencies.is_empty() {
        return RebuildDecision::Rebuild(RebuildReason::NoDependencies);
    }

    for dep in &artifact.dependencies {
        match modified_since(&dep.file_path, dep.timestamp) {
            Ok(false) => {}
            Ok(true) => {
                return RebuildDecision::Rebuild(RebuildReason::DependencyModified(
                    dep.file_path.clone(),
                ));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return RebuildDecision::Rebuild(RebuildReason::DependencyMissing(
                    dep.file_path.clone(),
                ));
            }
            Err(e) => {
                debug!(
                    "Cannot stat dependency {}, treating it as modified: {}",
                    dep.file_path.display(),
                    e
                );
                return RebuildDecision::Rebuild(RebuildReason::DependencyModified(
                    dep.file_path.clone(),
                ));
            }
        }
    }

    RebuildDecision::Skip
}

/// True when the file's mtime is strictly later than `recorded`
///
/// Recorded timestamps without a sub-second part were captured at second
/// precision, so the live mtime is truncated the same way before comparing.
fn modified_since(path: &Path, recorded: DateTime<Utc>) -> io::Result<bool> {
    let mut live: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
    if recorded.nanosecond() == 0 {
        live = live.trunc_subsecs(0);
    }
    Ok(live > recorded)
}
