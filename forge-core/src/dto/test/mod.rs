//! Test-runner tool DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the test-runner tool
pub const RUN_TESTS_TOOL: &str = "runTests";

/// Input of the `runTests` tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestsInput {
    pub stage: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spec: BTreeMap<String, serde_json::Value>,
}
