//! Forge Core
//!
//! Core types and abstractions for the Forge build orchestrator.
//!
//! This crate contains:
//! - Domain types: artifacts, test reports, test environments and the store document
//! - DTOs: tool inputs/outputs and the JSON-RPC envelope spoken with engines
//! - Engine references: the `scheme://name[@version]` identifiers of engines

pub mod domain;
pub mod dto;
pub mod engine_ref;

pub use engine_ref::{EngineRef, EngineRefError};
