//! Service Layer
//!
//! Orchestration logic built on the repository and on engine capabilities.

pub mod build;
pub mod engine;
pub mod environment;
pub mod rebuild;
pub mod report;
