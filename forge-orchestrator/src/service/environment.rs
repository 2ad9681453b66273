//! Test Environment Service
//!
//! Tracks provisioned test environments so they can be torn down later.

use std::collections::BTreeMap;

use forge_core::domain::environment::TestEnvironment;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::repository::ArtifactStore;

/// Per-environment results of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Ids of environments torn down and forgotten
    pub removed: Vec<String>,
    /// Environments left in place, with the reason
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub id: String,
    pub error: String,
}

/// Record a new test environment
pub fn create_environment(
    store: &ArtifactStore,
    name: &str,
    metadata: BTreeMap<String, String>,
) -> Result<TestEnvironment> {
    let env = TestEnvironment::new(name, metadata);
    store.put_environment(env.clone())?;
    info!("Recorded test environment {} ({})", env.name, env.id);
    Ok(env)
}

/// List test environments, oldest first
pub fn list_environments(store: &ArtifactStore) -> Result<Vec<TestEnvironment>> {
    let doc = store.read_or_default()?;
    let mut envs: Vec<TestEnvironment> = doc.test_environments.into_values().collect();
    envs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(envs)
}

/// Forget a test environment record
pub fn delete_environment(store: &ArtifactStore, id: &str) -> Result<TestEnvironment> {
    let env = store.remove_environment(id)?;
    info!("Deleted test environment {} ({})", env.name, env.id);
    Ok(env)
}

/// Tears down every recorded environment with `teardown`
///
/// An environment's record is removed only after its teardown succeeded.
/// Every failure is reported; none stops the pass.
pub fn cleanup_environments<F>(store: &ArtifactStore, mut teardown: F) -> Result<CleanupReport>
where
    F: FnMut(&TestEnvironment) -> std::result::Result<(), String>,
{
    let mut report = CleanupReport::default();

    for env in list_environments(store)? {
        if let Err(error) = teardown(&env) {
            warn!("Teardown of environment {} failed: {}", env.id, error);
            report.failures.push(CleanupFailure { id: env.id, error });
            continue;
        }

        match store.remove_environment(&env.id) {
            Ok(_) => report.removed.push(env.id),
            Err(e) => {
                warn!("Environment {} torn down but not forgotten: {}", env.id, e);
                report.failures.push(CleanupFailure {
                    id: env.id,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Cleanup removed {} environment(s), {} failure(s)",
        report.removed.len(),
        report.failures.len()
    );
    Ok(report)
}
