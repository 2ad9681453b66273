//! Artifact domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One produced unit of work and the inputs it was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Logical identifier, unique within its type namespace
    pub name: String,

    /// Category (e.g. "command-output", "bpf", "generated")
    #[serde(rename = "type")]
    pub kind: String,

    /// Where the produced output lives
    pub location: String,

    /// When this record was created or updated
    pub timestamp: DateTime<Utc>,

    /// Human-readable summary of what produced the artifact
    #[serde(default)]
    pub version: String,

    /// Declared inputs, in detection order
    #[serde(default)]
    pub dependencies: Vec<ArtifactDependency>,

    /// Engine able to recompute `dependencies`; empty when unknown
    #[serde(default)]
    pub dependency_detector_engine: String,
}

impl Artifact {
    /// Creates an artifact stamped with the current time and no dependencies
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        location: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            location: location.into(),
            timestamp: Utc::now(),
            version: version.into(),
            dependencies: Vec::new(),
            dependency_detector_engine: String::new(),
        }
    }

    /// Attaches detected dependencies and the detector that produced them
    pub fn with_dependencies(
        mut self,
        dependencies: Vec<ArtifactDependency>,
        detector: impl Into<String>,
    ) -> Self {
        self.dependencies = dependencies;
        self.dependency_detector_engine = detector.into();
        self
    }

    /// Checks the invariants an artifact must hold before it is persisted
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("artifact name cannot be empty".to_string());
        }

        if let Some(dep) = self.dependencies.iter().find(|d| !d.file_path.is_absolute()) {
            return Err(format!(
                "dependency path '{}' of artifact '{}' is not absolute",
                dep.file_path.display(),
                self.name
            ));
        }

        Ok(())
    }
}

/// One declared input of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDependency {
    #[serde(rename = "type")]
    pub kind: DependencyKind,

    /// Absolute path of the input file
    pub file_path: PathBuf,

    /// Modification time of the file when the dependency was detected
    pub timestamp: DateTime<Utc>,
}

impl ArtifactDependency {
    /// Creates a file dependency snapshot
    pub fn file(file_path: impl Into<PathBuf>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: DependencyKind::File,
            file_path: file_path.into(),
            timestamp,
        }
    }
}

/// Dependency discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    File,
}
