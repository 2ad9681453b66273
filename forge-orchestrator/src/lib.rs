//! Forge Orchestrator
//!
//! Decides which units of work must be redone and drives engines to redo them.
//!
//! Architecture:
//! - Configuration: settings read once from the environment ([`config::Config`])
//! - Repository: the file-backed store of artifacts, test environments and
//!   test reports, mutated under an exclusive lock
//! - Services: the lazy-rebuild decision, engine capabilities and the
//!   build/test/report/environment workflows built on them

pub mod config;
pub mod error;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{OrchestratorError, Result};
