//! Report Service
//!
//! Read and delete recorded test reports.

use std::fs;
use std::io;
use std::path::PathBuf;

use forge_core::domain::test_report::TestReport;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::repository::{ArtifactStore, get_test_report};

/// Result of deleting a test report and its side files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReportOutcome {
    /// True when the record and every file are gone
    pub success: bool,
    /// True when the record is gone but some files could not be removed
    pub partially_deleted: bool,
    pub deleted_files: Vec<PathBuf>,
    pub failed_files: Vec<PathBuf>,
    pub message: String,
}

/// Get a test report by id
pub fn get_report(store: &ArtifactStore, id: &str) -> Result<TestReport> {
    let doc = store.read_or_default()?;
    Ok(get_test_report(&doc, id)?.clone())
}

/// List test reports, newest first, optionally restricted to one stage
pub fn list_reports(store: &ArtifactStore, stage: Option<&str>) -> Result<Vec<TestReport>> {
    let doc = store.read_or_default()?;

    let mut reports: Vec<TestReport> = doc
        .test_reports
        .into_values()
        .filter(|r| stage.is_none_or(|s| r.stage == s))
        .collect();
    reports.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));

    Ok(reports)
}

/// Delete a test report record, then its artifact files
///
/// The record is removed first; if that fails no file is touched. Files that
/// are already gone are not failures. Any other removal error is collected in
/// `failed_files` and the outcome is marked partially deleted.
pub fn delete_report(store: &ArtifactStore, id: &str) -> Result<DeleteReportOutcome> {
    let report = store.remove_test_report(id)?;
    info!("Deleted test report record {}", id);

    let mut deleted_files = Vec::new();
    let mut failed_files = Vec::new();

    for path in &report.artifact_files {
        match fs::remove_file(path) {
            Ok(()) => deleted_files.push(path.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Artifact file {} already absent", path.display());
            }
            Err(e) => {
                warn!("Failed to delete artifact file {}: {}", path.display(), e);
                failed_files.push(path.clone());
            }
        }
    }

    let message = if failed_files.is_empty() {
        format!(
            "Deleted test report {} and {} artifact file(s)",
            id,
            deleted_files.len()
        )
    } else {
        format!(
            "Deleted test report {} but {} of {} artifact file(s) could not be removed",
            id,
            failed_files.len(),
            report.artifact_files.len()
        )
    };

    Ok(DeleteReportOutcome {
        success: failed_files.is_empty(),
        partially_deleted: !failed_files.is_empty(),
        deleted_files,
        failed_files,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::repository::StoreError;
    use chrono::{Duration, Utc};
    use forge_core::domain::test_report::{Coverage, TestStats, TestStatus};
    use std::path::Path;

    fn report(id: &str, stage: &str, age_secs: i64, files: Vec<PathBuf>) -> TestReport {
        TestReport {
            id: id.to_string(),
            stage: stage.to_string(),
            name: stage.to_string(),
            status: TestStatus::Passed,
            error_message: String::new(),
            start_time: Utc::now() - Duration::seconds(age_secs),
            duration: 2.0,
            test_stats: TestStats {
                total: 4,
                passed: 4,
                failed: 0,
            },
            coverage: Coverage::default(),
            artifact_files: files,
        }
    }

    fn store_with(dir: &Path, reports: Vec<TestReport>) -> ArtifactStore {
        let store = ArtifactStore::new(dir.join("store.json"));
        for r in reports {
            store.put_test_report(r).unwrap();
        }
        store
    }

    #[test]
    fn test_get_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), vec![report("r1", "unit", 0, Vec::new())]);

        assert_eq!(get_report(&store, "r1").unwrap().stage, "unit");
        assert!(matches!(
            get_report(&store, "r2"),
            Err(OrchestratorError::Store(StoreError::TestReportNotFound(_)))
        ));
    }

    #[test]
    fn test_list_filters_by_stage_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            dir.path(),
            vec![
                report("old-unit", "unit", 100, Vec::new()),
                report("new-unit", "unit", 1, Vec::new()),
                report("e2e", "e2e", 50, Vec::new()),
            ],
        );

        let all = list_reports(&store, None).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new-unit", "e2e", "old-unit"]);

        let unit = list_reports(&store, Some("unit")).unwrap();
        assert_eq!(unit.len(), 2);
        assert!(unit.iter().all(|r| r.stage == "unit"));

        assert!(list_reports(&store, Some("lint")).unwrap().is_empty());
    }

    #[test]
    fn test_list_on_absent_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("missing.json"));
        assert!(list_reports(&store, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_counts_absent_files_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.xml");
        let b = dir.path().join("b.xml");
        fs::write(&b, "<testsuite/>").unwrap();

        let store = store_with(
            dir.path(),
            vec![report("test-unit-20251105-001", "unit", 0, vec![a, b.clone()])],
        );

        let outcome = delete_report(&store, "test-unit-20251105-001").unwrap();
        assert!(outcome.success);
        assert!(!outcome.partially_deleted);
        assert_eq!(outcome.deleted_files, vec![b.clone()]);
        assert!(outcome.failed_files.is_empty());
        assert!(!b.exists());
        assert!(store.read().unwrap().test_reports.is_empty());
    }

    #[test]
    fn test_delete_reports_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let stuck = dir.path().join("coverage");
        fs::create_dir(&stuck).unwrap();
        fs::write(stuck.join("index.html"), "<html/>").unwrap();
        let ok = dir.path().join("junit.xml");
        fs::write(&ok, "<testsuite/>").unwrap();

        let store = store_with(
            dir.path(),
            vec![report("r1", "unit", 0, vec![stuck.clone(), ok.clone()])],
        );

        let outcome = delete_report(&store, "r1").unwrap();
        assert!(!outcome.success);
        assert!(outcome.partially_deleted);
        assert_eq!(outcome.deleted_files, vec![ok]);
        assert_eq!(outcome.failed_files, vec![stuck.clone()]);
        assert!(stuck.exists());
        assert!(store.read().unwrap().test_reports.is_empty());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["partiallyDeleted"], true);
        assert_eq!(json["failedFiles"][0], stuck.display().to_string());
    }

    #[test]
    fn test_delete_missing_report_touches_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), Vec::new());

        assert!(matches!(
            delete_report(&store, "nope"),
            Err(OrchestratorError::Store(StoreError::TestReportNotFound(_)))
        ));
    }
}
