//! Test environment domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A provisioned test environment (e.g. a local cluster) tracked for cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvironment {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Free-form metadata such as the recorded cluster name
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl TestEnvironment {
    /// Creates an environment record with a fresh id
    pub fn new(name: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            metadata,
        }
    }
}
