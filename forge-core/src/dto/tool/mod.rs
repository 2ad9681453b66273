//! Tool call results

use serde::{Deserialize, Serialize};

use crate::domain::artifact::Artifact;
use crate::domain::test_report::TestReport;

/// Result of one tool call
///
/// Failures are reported in-band with `is_error` rather than as transport
/// errors so that callers can inspect them like any other result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default)]
    pub is_error: bool,
    /// Human-readable summary
    #[serde(default)]
    pub message: String,
    /// Tool-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_report: Option<TestReport>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_test_report(mut self, report: TestReport) -> Self {
        self.test_report = Some(report);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_wire_shape() {
        let json = serde_json::to_value(ToolResult::failure("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "isError": true, "message": "boom" }));
    }
}
