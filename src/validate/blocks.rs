//! Task block detection and consistency checks.
//!
//! Blocks are found with a depth-first walk from every root that pairs each
//! START marker with the END marker closing it. Two gates hold a node back
//! until it may be entered: join nodes wait for a branch to arm them, and
//! IF branch targets wait for their IF task.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{FlowError, FlowErrorKind};
use crate::parse::graph::{FlowGraph, NodeId};
use crate::parse::types::{FlowActionKind, FlowBlock};

/// A matched START/END pair, as node ids into the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: NodeId,
    pub end: NodeId,
}

/// A matched START/END pair by task name, as handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskBlock {
    pub start: String,
    pub end: String,
}

impl TaskBlock {
    pub fn from_block(graph: &FlowGraph<'_>, block: &Block) -> Self {
        TaskBlock {
            start: graph.name(block.start).to_string(),
            end: graph.name(block.end).to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

struct BlockDetector<'g, 'a> {
    graph: &'g FlowGraph<'a>,
    done: Vec<bool>,
    armed: Vec<bool>,
    blocks: Vec<Block>,
}

/// Pair every START marker with its END marker.
pub fn detect_blocks(graph: &FlowGraph<'_>) -> Result<Vec<Block>, FlowError> {
    let mut detector = BlockDetector {
        graph,
        done: vec![false; graph.len()],
        armed: vec![false; graph.len()],
        blocks: Vec::new(),
    };

    for &root in &graph.roots {
        let mut open = Vec::new();
        let mut joins = Vec::new();
        detector.visit(root, &mut open, &mut joins)?;
        if let Some(&unclosed) = open.first() {
            return Err(FlowError::at(
                FlowErrorKind::Block,
                "Unmatched start block",
                graph.name(unclosed),
            ));
        }
    }

    Ok(detector.blocks)
}

impl BlockDetector<'_, '_> {
    /// A join node stays closed until a branch reaching it arms it.
    fn join_gate_open(&self, id: NodeId) -> bool {
        self.armed[id.index()] || self.graph.incoming_joins(id).is_empty()
    }

    /// A branch target stays closed until its IF task has been visited.
    fn branch_gate_open(&self, id: NodeId) -> bool {
        self.graph
            .branch_of(id)
            .is_none_or(|owner| self.done[owner.index()])
    }

    /// Depth-first walk from `root`. Each frame holds the nodes still to be
    /// entered after the node that pushed it.
    fn visit(
        &mut self,
        root: NodeId,
        open: &mut Vec<NodeId>,
        joins: &mut Vec<NodeId>,
    ) -> Result<(), FlowError> {
        let mut frames: Vec<std::vec::IntoIter<NodeId>> = Vec::new();
        if let Some(next) = self.enter(root, open, joins)? {
            frames.push(next.into_iter());
        }
        while let Some(frame) = frames.last_mut() {
            let Some(child) = frame.next() else {
                frames.pop();
                continue;
            };
            if let Some(next) = self.enter(child, open, joins)? {
                frames.push(next.into_iter());
            }
        }
        Ok(())
    }

    /// Marks `id` visited and returns the nodes to walk next, or `None` while
    /// a gate holds it back.
    fn enter(
        &mut self,
        id: NodeId,
        open: &mut Vec<NodeId>,
        joins: &mut Vec<NodeId>,
    ) -> Result<Option<Vec<NodeId>>, FlowError> {
        if !self.join_gate_open(id) || !self.branch_gate_open(id) || self.done[id.index()] {
            return Ok(None);
        }
        self.done[id.index()] = true;

        let graph = self.graph;
        let task = graph.task(id);
        match task.flow_block {
            FlowBlock::Start => open.push(id),
            FlowBlock::End => {
                let Some(start) = open.pop() else {
                    return Err(FlowError::at(
                        FlowErrorKind::Block,
                        "Unmatched end block",
                        graph.name(id),
                    ));
                };
                self.blocks.push(Block { start, end: id });
            }
            FlowBlock::None => {}
        }

        let mut next = graph.children(id);
        if next.is_empty() {
            if task.action_kind() == FlowActionKind::If {
                if let Some(join) = graph.join_target(id) {
                    joins.push(join);
                }
                next = graph.branch_targets(id);
            } else if let Some(join) = joins.pop() {
                self.armed[join.index()] = true;
                next.push(join);
            }
        }
        Ok(Some(next))
    }
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

/// Detect blocks, then check each one is single-entry and single-exit.
pub fn check_blocks(graph: &FlowGraph<'_>) -> Result<Vec<Block>, FlowError> {
    let blocks = detect_blocks(graph)?;
    for block in &blocks {
        check_block_down(graph, block.end, block.start, &mut HashSet::new())?;
        check_block_up(graph, block.start, block.end, &mut HashSet::new())?;
    }
    Ok(blocks)
}

/// Every flow leaving `node` must reach `end`.
pub fn check_block_down(
    graph: &FlowGraph<'_>,
    end: NodeId,
    node: NodeId,
    cleared: &mut HashSet<NodeId>,
) -> Result<(), FlowError> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current == end || !cleared.insert(current) {
            continue;
        }
        let next = graph.downstream(current);
        if next.is_empty() {
            return Err(FlowError::at(
                FlowErrorKind::Block,
                format!(
                    "Task Block ending at {} does not join all its flows",
                    graph.name(end)
                ),
                graph.name(current),
            ));
        }
        stack.extend(next.into_iter().rev());
    }
    Ok(())
}

/// Every dependency of `node` must trace back to `start`.
pub fn check_block_up(
    graph: &FlowGraph<'_>,
    start: NodeId,
    node: NodeId,
    cleared: &mut HashSet<NodeId>,
) -> Result<(), FlowError> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current == start || !cleared.insert(current) {
            continue;
        }
        let prev = graph.upstream(current);
        if prev.is_empty() {
            return Err(FlowError::at(
                FlowErrorKind::Block,
                format!(
                    "Task Block starting at {} has external dependencies",
                    graph.name(start)
                ),
                graph.name(current),
            ));
        }
        stack.extend(prev.into_iter().rev());
    }
    Ok(())
}
