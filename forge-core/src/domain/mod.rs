//! Core domain types
//!
//! This module contains the core domain structures used across Forge crates.
//! These types are persisted by the orchestrator in the store file and
//! produced by engines as tool results.

pub mod artifact;
pub mod environment;
pub mod store;
pub mod test_report;
