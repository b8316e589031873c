//! Parse phase: job descriptor JSON → task model, plus the flow graph built from it.

pub mod graph;
pub mod types;

pub use graph::{FlowGraph, Link, NodeId};
pub use types::*;

use crate::error::FlowError;

/// Deserialize a job descriptor JSON string into a `Job`.
pub fn parse(json: &str) -> Result<Job, FlowError> {
    serde_json::from_str::<Job>(json)
        .map_err(|e| FlowError::parse(format!("Failed to parse job JSON: {}", e)))
}
