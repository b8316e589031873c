//! Job-level structural rules: names, reachability, recursion.

use std::collections::HashSet;

use petgraph::algo::toposort;

use crate::error::{FlowError, FlowErrorKind};
use crate::parse::graph::{FlowGraph, NodeId};
use crate::parse::types::{ITERATION_SEPARATOR, REPLICATION_SEPARATOR, Task};

/// Task names must be unique and free of the runtime's reserved separators.
pub fn check_names(tasks: &[Task]) -> Result<(), FlowError> {
    let mut seen = HashSet::new();
    for task in tasks {
        let name = task.name.as_str();
        for separator in [ITERATION_SEPARATOR, REPLICATION_SEPARATOR] {
            if name.contains(separator) {
                return Err(FlowError::at(
                    FlowErrorKind::Name,
                    format!("Task name cannot contain special character '{}'", separator),
                    name,
                ));
            }
        }
        if !seen.insert(name) {
            return Err(FlowError::at(
                FlowErrorKind::Name,
                "Task names are not unique",
                name,
            ));
        }
    }
    Ok(())
}

/// Forward fixed point from the roots: a task is reached once all of its
/// dependencies are. Anything left over sits on a cycle or depends on a
/// task that does not exist.
pub fn check_reachable(graph: &FlowGraph<'_>) -> Result<(), FlowError> {
    // Unknown dependency names never count down, so their tasks stay pending.
    let mut waiting: Vec<usize> = graph
        .ids()
        .map(|id| graph.task(id).dependencies.len())
        .collect();
    let mut ready: Vec<NodeId> = graph.ids().filter(|id| waiting[id.index()] == 0).collect();

    while let Some(id) = ready.pop() {
        for child in graph.children(id) {
            waiting[child.index()] -= 1;
            if waiting[child.index()] == 0 {
                ready.push(child);
            }
        }
    }

    let unreached: Vec<NodeId> = graph.ids().filter(|id| waiting[id.index()] > 0).collect();
    if unreached.is_empty() {
        return Ok(());
    }
    Err(unreached.iter().fold(
        FlowError::new(FlowErrorKind::Unreachable, "Some tasks can not be reached"),
        |err, &id| err.with_task(graph.name(id)),
    ))
}

/// No cycle may be formed by dependency, IF branch and join links. LOOP
/// back-references are not links and are never reported here.
pub fn check_recursion(graph: &FlowGraph<'_>) -> Result<(), FlowError> {
    match toposort(&graph.graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(FlowError::at(
            FlowErrorKind::Recursion,
            "Infinite recursion detected",
            graph.name(cycle.node_id()),
        )),
    }
}
