//! Artifact Store
//!
//! The store is one JSON document on disk. Readers parse whatever is there;
//! writers hold an exclusive lock on a sibling `.lock` file for the whole
//! read-modify-write cycle and replace the document by renaming a fully
//! written temporary file over it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use forge_core::domain::artifact::Artifact;
use forge_core::domain::environment::TestEnvironment;
use forge_core::domain::store::StoreDocument;
use forge_core::domain::test_report::TestReport;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::lock::StoreLock;
use crate::config::Config;

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Store at {} is corrupted: {source}", .path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store at {} is locked by another process (gave up after {attempts} attempts)", .path.display())]
    Contention { path: PathBuf, attempts: u32 },

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Test report not found: {0}")]
    TestReportNotFound(String),

    #[error("Test environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Handle on the store file
///
/// Cheap to clone; holds no open file between operations.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
    lock_timeout: Duration,
    max_attempts: u32,
}

impl ArtifactStore {
    /// Create a store handle with default lock settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = Config::default();
        Self {
            path: path.into(),
            lock_timeout: defaults.lock_timeout,
            max_attempts: defaults.max_lock_attempts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.store_path.clone(),
            lock_timeout: config.lock_timeout,
            max_attempts: config.max_lock_attempts.max(1),
        }
    }

    /// Overrides the lock acquisition bounds
    pub fn with_lock_timeout(mut self, lock_timeout: Duration, max_attempts: u32) -> Self {
        self.lock_timeout = lock_timeout;
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a snapshot of the store
    ///
    /// An absent file is [`StoreError::NotFound`]; a file that does not parse
    /// is [`StoreError::Corrupted`].
    pub fn read(&self) -> Result<StoreDocument, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupted {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads a snapshot, treating an absent store as empty
    pub fn read_or_default(&self) -> Result<StoreDocument, StoreError> {
        match self.read() {
            Ok(doc) => Ok(doc),
            Err(StoreError::NotFound(_)) => Ok(StoreDocument::default()),
            Err(e) => Err(e),
        }
    }

    /// Runs a store operation on the blocking thread pool
    ///
    /// Store access waits on file locks; async callers go through here so a
    /// contended lock never stalls a runtime worker.
    pub async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ArtifactStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Loads, mutates and writes the store as one indivisible step
    ///
    /// If `mutate` fails nothing is written and its error is returned.
    ///
    /// # Arguments
    /// * `mutate` - Applied to the freshly loaded document while the lock is held
    ///
    /// # Returns
    /// Whatever `mutate` returned
    pub fn atomic_update<T, F>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut StoreDocument) -> Result<T, StoreError>,
    {
        let _lock = self.lock()?;

        let mut doc = self.read_or_default()?;
        let value = mutate(&mut doc)?;
        self.write(&doc)?;

        Ok(value)
    }

    /// Inserts or replaces an artifact, returning the one it replaced
    pub fn put_artifact(&self, artifact: Artifact) -> Result<Option<Artifact>, StoreError> {
        artifact.validate().map_err(StoreError::InvalidArtifact)?;
        self.atomic_update(|doc| Ok(doc.upsert_artifact(artifact)))
    }

    /// Records a test report, returning it as stored
    ///
    /// A different report already holding the same id is kept; the new one is
    /// stored under the next free sequence id (see
    /// [`StoreDocument::insert_test_report`]).
    pub fn put_test_report(&self, mut report: TestReport) -> Result<TestReport, StoreError> {
        let requested = report.id.clone();
        let stored = self.atomic_update(|doc| Ok(doc.insert_test_report(report.clone())))?;
        report.id = stored;

        if report.id != requested {
            debug!("Report id {} taken, stored as {}", requested, report.id);
        }
        Ok(report)
    }

    /// Removes a test report record, returning it
    pub fn remove_test_report(&self, id: &str) -> Result<TestReport, StoreError> {
        self.atomic_update(|doc| {
            doc.test_reports
                .remove(id)
                .ok_or_else(|| StoreError::TestReportNotFound(id.to_string()))
        })
    }

    pub fn put_environment(
        &self,
        env: TestEnvironment,
    ) -> Result<Option<TestEnvironment>, StoreError> {
        self.atomic_update(|doc| Ok(doc.upsert_environment(env)))
    }

    /// Removes a test environment record, returning it
    pub fn remove_environment(&self, id: &str) -> Result<TestEnvironment, StoreError> {
        self.atomic_update(|doc| {
            doc.test_environments
                .remove(id)
                .ok_or_else(|| StoreError::EnvironmentNotFound(id.to_string()))
        })
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        let lock_path = StoreLock::path_for(&self.path);
        ensure_parent(&lock_path)?;

        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=self.max_attempts {
            let acquired = StoreLock::try_acquire(&lock_path, self.lock_timeout)
                .map_err(|e| StoreError::io(&lock_path, e))?;

            if let Some(lock) = acquired {
                debug!("Acquired store lock {}", lock.path().display());
                return Ok(lock);
            }

            warn!(
                "Store lock {} still held after {:?} (attempt {}/{})",
                lock_path.display(),
                self.lock_timeout,
                attempt,
                self.max_attempts
            );

            if attempt < self.max_attempts {
                thread::sleep(backoff);
                backoff *= 2;
            }
        }

        Err(StoreError::Contention {
            path: self.path.clone(),
            attempts: self.max_attempts,
        })
    }

    fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let dir = ensure_parent(&self.path)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, doc).map_err(StoreError::Serialize)?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!("Wrote store {}", self.path.display());
        Ok(())
    }
}

/// Creates the parent directory of `path` and returns it
fn ensure_parent(path: &Path) -> Result<PathBuf, StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
    Ok(dir)
}

/// Looks up an artifact by name in a snapshot
pub fn get_artifact<'a>(doc: &'a StoreDocument, name: &str) -> Result<&'a Artifact, StoreError> {
    doc.artifacts
        .get(name)
        .ok_or_else(|| StoreError::ArtifactNotFound(name.to_string()))
}

/// Looks up a test report by id in a snapshot
pub fn get_test_report<'a>(doc: &'a StoreDocument, id: &str) -> Result<&'a TestReport, StoreError> {
    doc.test_reports
        .get(id)
        .ok_or_else(|| StoreError::TestReportNotFound(id.to_string()))
}

/// Looks up a test environment by id in a snapshot
pub fn get_environment<'a>(
    doc: &'a StoreDocument,
    id: &str,
) -> Result<&'a TestEnvironment, StoreError> {
    doc.test_environments
        .get(id)
        .ok_or_else(|| StoreError::EnvironmentNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use forge_core::domain::artifact::ArtifactDependency;
    use forge_core::domain::test_report::{Coverage, TestStats, TestStatus};
    use std::sync::{Arc, Barrier};

    fn store_in(dir: &tempfile::TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path().join("nested").join("artifact-store.json"))
    }

    fn report(id: &str) -> TestReport {
        TestReport {
            id: id.to_string(),
            stage: "unit".to_string(),
            name: String::new(),
            status: TestStatus::Passed,
            error_message: String::new(),
            start_time: Utc::now(),
            duration: 1.5,
            test_stats: TestStats {
                total: 3,
                passed: 3,
                failed: 0,
            },
            coverage: Coverage { percentage: 81.2 },
            artifact_files: Vec::new(),
        }
    }

    #[test]
    fn test_absent_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(matches!(store.read(), Err(StoreError::NotFound(_))));
        assert!(store.read_or_default().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_store_is_distinct_from_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact-store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ArtifactStore::new(&path);
        assert!(matches!(store.read(), Err(StoreError::Corrupted { .. })));
        assert!(matches!(store.read_or_default(), Err(StoreError::Corrupted { .. })));

        // A corrupted store is never overwritten by a mutation.
        let err = store.put_test_report(report("r1")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_round_trip_preserves_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let ts: DateTime<Utc> = "2025-11-05T14:03:09.123456789Z".parse().unwrap();
        let mut artifact = Artifact::new("bin", "command-output", "/repo/build/bin", "v1")
            .with_dependencies(
                vec![ArtifactDependency::file("/repo/main.go", ts)],
                "bin://forge-engine",
            );
        artifact.timestamp = ts;

        store.put_artifact(artifact.clone()).unwrap();
        store.put_test_report(report("test-unit-20251105-140309")).unwrap();

        let doc = store.read().unwrap();
        assert_eq!(get_artifact(&doc, "bin").unwrap(), &artifact);
        assert_eq!(get_artifact(&doc, "bin").unwrap().dependencies[0].timestamp, ts);
        assert_eq!(
            get_test_report(&doc, "test-unit-20251105-140309").unwrap().coverage.percentage,
            81.2
        );

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"dependencyDetectorEngine\": \"bin://forge-engine\""));
        assert!(raw.contains("2025-11-05T14:03:09.123456789Z"));
    }

    #[test]
    fn test_missing_lookups() {
        let doc = StoreDocument::default();
        assert!(matches!(get_artifact(&doc, "x"), Err(StoreError::ArtifactNotFound(_))));
        assert!(matches!(get_test_report(&doc, "x"), Err(StoreError::TestReportNotFound(_))));
        assert!(matches!(get_environment(&doc, "x"), Err(StoreError::EnvironmentNotFound(_))));
    }

    #[test]
    fn test_invalid_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let artifact = Artifact::new("bin", "command-output", "out", "v1").with_dependencies(
            vec![ArtifactDependency::file("relative/main.go", Utc::now())],
            "bin://forge-engine",
        );
        assert!(matches!(
            store.put_artifact(artifact),
            Err(StoreError::InvalidArtifact(_))
        ));
        assert!(matches!(store.read(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_failed_mutation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.put_test_report(report("keep")).unwrap();

        let err = store.remove_test_report("missing").unwrap_err();
        assert!(matches!(err, StoreError::TestReportNotFound(_)));
        assert!(store.read().unwrap().test_reports.contains_key("keep"));
    }

    #[test]
    fn test_remove_returns_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let env = TestEnvironment::new("kind", Default::default());
        store.put_environment(env.clone()).unwrap();
        assert_eq!(store.remove_environment(&env.id).unwrap(), env);
        assert!(store.read().unwrap().test_environments.is_empty());
    }

    #[test]
    fn test_concurrent_mutations_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .put_artifact(Artifact::new(
                            format!("artifact-{}", i),
                            "command-output",
                            "out",
                            "v1",
                        ))
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let doc = store.read().unwrap();
        assert_eq!(doc.artifacts.len(), threads);
    }

    #[test]
    fn test_concurrent_reports_with_same_id_all_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let threads = 6;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut r = report("test-unit-20251105-140309");
                    r.artifact_files = vec![PathBuf::from(format!("/tmp/junit-{}.xml", i))];
                    barrier.wait();
                    store.put_test_report(r).unwrap().id
                })
            })
            .collect();

        let mut ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), threads);

        let doc = store.read().unwrap();
        assert_eq!(doc.test_reports.len(), threads);
        for id in &ids {
            assert_eq!(&doc.test_reports[id].id, id);
        }
    }

    #[tokio::test]
    async fn test_blocking_wait_leaves_runtime_free() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).with_lock_timeout(Duration::from_millis(300), 1);

        let lock_path = StoreLock::path_for(store.path());
        ensure_parent(&lock_path).unwrap();
        let _held = StoreLock::try_acquire(&lock_path, Duration::from_millis(30))
            .unwrap()
            .unwrap();

        let ticker = tokio::spawn(async {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let err = store
            .blocking(|s| s.put_test_report(report("r1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Contention { attempts: 1, .. }));
        assert!(ticker.is_finished());
    }

    #[test]
    fn test_held_lock_yields_contention() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).with_lock_timeout(Duration::from_millis(30), 2);

        let lock_path = StoreLock::path_for(store.path());
        ensure_parent(&lock_path).unwrap();
        let _held = StoreLock::try_acquire(&lock_path, Duration::from_millis(30))
            .unwrap()
            .unwrap();

        let err = store.put_test_report(report("r1")).unwrap_err();
        assert!(matches!(err, StoreError::Contention { attempts: 2, .. }));
    }
}
