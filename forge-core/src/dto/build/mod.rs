//! Builder tool DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the builder tool
pub const BUILD_TOOL: &str = "build";

/// Build spec key naming the dependency detector engine
pub const DEPENDENCY_DETECTOR_KEY: &str = "dependencyDetector";

/// Build spec key holding the command to run
pub const COMMAND_KEY: &str = "command";

/// Input of the `build` tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInput {
    /// Artifact name to produce
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Engine reference the orchestrator resolved, for engines that echo it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Free-form engine-specific settings
    #[serde(default)]
    pub spec: BTreeMap<String, serde_json::Value>,
}

impl BuildInput {
    /// Detector named by `spec.dependencyDetector`, if any
    pub fn dependency_detector(&self) -> Option<&str> {
        self.spec
            .get(DEPENDENCY_DETECTOR_KEY)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
