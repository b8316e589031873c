//! Static validation of a job's task flow.
//!
//! Builds the flow graph, then runs every rule in a fixed order and stops at
//! the first violation. Each call owns its graph and scratch state, so jobs
//! can be validated concurrently from any number of threads.

pub mod blocks;
pub mod flow_rules;
pub mod structural;

pub use blocks::{Block, TaskBlock};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::FlowError;
use crate::parse::graph::FlowGraph;
use crate::parse::types::{Job, Task};

/// Outcome of one validation run.
///
/// `blocks` lists the task blocks detected before the first failure; callers
/// must not rely on its content when `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub blocks: Vec<TaskBlock>,
    pub error: Option<FlowError>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<TaskBlock>, FlowError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.blocks),
        }
    }
}

/// Validate a job's tasks. Never mutates `tasks`.
#[instrument(skip_all, fields(tasks = tasks.len()))]
pub fn validate(tasks: &[Task]) -> Validation {
    let mut blocks = Vec::new();
    let error = run_checks(tasks, &mut blocks).err();
    if let Some(e) = &error {
        debug!(kind = %e.kind, message = %e.message, "job rejected");
    }
    Validation { blocks, error }
}

pub fn validate_job(job: &Job) -> Validation {
    validate(&job.tasks)
}

fn run_checks(tasks: &[Task], detected: &mut Vec<TaskBlock>) -> Result<(), FlowError> {
    let graph = FlowGraph::build(tasks)?;

    structural::check_names(tasks)?;
    structural::check_reachable(&graph)?;
    structural::check_recursion(&graph)?;

    let blocks = blocks::check_blocks(&graph)?;
    debug!(blocks = blocks.len(), "task blocks detected");
    detected.extend(blocks.iter().map(|b| TaskBlock::from_block(&graph, b)));

    flow_rules::check_duplicate(&graph, &blocks)?;
    flow_rules::check_loop(&graph, &blocks)?;
    flow_rules::check_if(&graph, &blocks)?;

    Ok(())
}
