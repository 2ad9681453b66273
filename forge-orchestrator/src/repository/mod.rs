//! Repository layer
//!
//! File-backed persistence for artifacts, test environments and test reports.

mod lock;
pub mod store;

pub use lock::StoreLock;
pub use store::{ArtifactStore, StoreError, get_artifact, get_environment, get_test_report};
