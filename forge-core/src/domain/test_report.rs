//! Test report domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One completed test-stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub id: String,
    pub stage: String,
    #[serde(default)]
    pub name: String,
    pub status: TestStatus,
    #[serde(default)]
    pub error_message: String,
    pub start_time: DateTime<Utc>,
    /// Duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub test_stats: TestStats,
    #[serde(default)]
    pub coverage: Coverage,
    /// Side files (coverage XML, JUnit XML, ...) deleted together with the report
    #[serde(default)]
    pub artifact_files: Vec<PathBuf>,
}

impl TestReport {
    /// Builds the conventional report id `test-<stage>-<YYYYMMDD>-<HHMMSS>`
    pub fn generate_id(stage: &str, start_time: DateTime<Utc>) -> String {
        format!("test-{}-{}", stage, start_time.format("%Y%m%d-%H%M%S"))
    }

    /// Disambiguates a taken report id: `<id>-NNN`
    pub fn sequenced_id(id: &str, seq: u32) -> String {
        format!("{}-{:03}", id, seq)
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Outcome of a test stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub percentage: f64,
}
