//! Store document
//!
//! The single JSON document persisted by the orchestrator. Values read from it
//! are snapshots; they do not observe concurrent writers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::artifact::Artifact;
use super::environment::TestEnvironment;
use super::test_report::TestReport;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    /// Artifacts keyed by name
    #[serde(default)]
    pub artifacts: BTreeMap<String, Artifact>,

    /// Test environments keyed by id
    #[serde(default)]
    pub test_environments: BTreeMap<String, TestEnvironment>,

    /// Test reports keyed by id
    #[serde(default)]
    pub test_reports: BTreeMap<String, TestReport>,
}

impl StoreDocument {
    /// Inserts or replaces an artifact under its own name
    pub fn upsert_artifact(&mut self, artifact: Artifact) -> Option<Artifact> {
        self.artifacts.insert(artifact.name.clone(), artifact)
    }

    /// Inserts a test report, returning the id it was stored under
    ///
    /// Re-inserting an identical report is a no-op. A different report whose
    /// id is taken gets the first free `<id>-NNN` sequence id instead, so an
    /// existing report is never replaced.
    pub fn insert_test_report(&mut self, mut report: TestReport) -> String {
        let base = report.id.clone();
        let mut seq = 1;

        loop {
            match self.test_reports.get(&report.id) {
                None => break,
                Some(existing) if *existing == report => return report.id,
                Some(_) => {
                    seq += 1;
                    report.id = TestReport::sequenced_id(&base, seq);
                }
            }
        }

        let id = report.id.clone();
        self.test_reports.insert(id.clone(), report);
        id
    }

    /// Inserts or replaces a test environment under its own id
    pub fn upsert_environment(&mut self, env: TestEnvironment) -> Option<TestEnvironment> {
        self.test_environments.insert(env.id.clone(), env)
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.test_environments.is_empty() && self.test_reports.is_empty()
    }
}
