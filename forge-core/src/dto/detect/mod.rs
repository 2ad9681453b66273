//! Dependency detector tool DTOs

use serde::{Deserialize, Serialize};

use crate::domain::artifact::ArtifactDependency;

/// Name of the dependency detector tool
pub const DETECT_DEPENDENCIES_TOOL: &str = "detectDependencies";

/// Input of the `detectDependencies` tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectDependenciesInput {
    pub work_dir: String,
}

/// Output of the `detectDependencies` tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectDependenciesOutput {
    #[serde(default)]
    pub dependencies: Vec<ArtifactDependency>,
}
