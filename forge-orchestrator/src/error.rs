//! Orchestrator error handling

use forge_client::{ClientError, ResolveError};
use thiserror::Error;

use crate::repository::StoreError;
use crate::service::engine::EngineError;

/// Errors surfaced by orchestrator operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OrchestratorError {
    /// True when the failure came from cancelling an engine call
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestratorError::Engine(EngineError::Client(e)) if e.is_cancellation())
    }
}

impl From<ClientError> for OrchestratorError {
    fn from(err: ClientError) -> Self {
        OrchestratorError::Engine(EngineError::Client(err))
    }
}

impl From<ResolveError> for OrchestratorError {
    fn from(err: ResolveError) -> Self {
        OrchestratorError::Engine(EngineError::Client(ClientError::Resolve(err)))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
