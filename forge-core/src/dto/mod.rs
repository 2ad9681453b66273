//! Data Transfer Objects for orchestrator/engine communication
//!
//! This module contains the typed tool inputs and outputs exchanged with
//! engines, and the JSON-RPC envelope that carries them over an engine's
//! standard streams.

pub mod build;
pub mod detect;
pub mod rpc;
pub mod test;
pub mod tool;
