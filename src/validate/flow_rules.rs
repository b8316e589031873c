//! Rules specific to the DUPLICATE, LOOP and IF control flow actions.

use std::collections::HashSet;

use petgraph::visit::{Dfs, EdgeFiltered, EdgeRef};

use super::blocks::{Block, check_block_up};
use crate::error::{FlowError, FlowErrorKind};
use crate::parse::graph::{FlowGraph, Link, NodeId};
use crate::parse::types::{FlowActionKind, FlowBlock};

/// Last detected block starting at `start`, if any.
fn block_starting_at(blocks: &[Block], start: NodeId) -> Option<Block> {
    blocks.iter().rev().find(|b| b.start == start).copied()
}

// ---------------------------------------------------------------------------
// DUPLICATE
// ---------------------------------------------------------------------------

/// A duplicated region needs a single entry and a plain merge point.
pub fn check_duplicate(graph: &FlowGraph<'_>, blocks: &[Block]) -> Result<(), FlowError> {
    for id in graph.ids() {
        if graph.task(id).action_kind() != FlowActionKind::Duplicate {
            continue;
        }

        for child in graph.children(id) {
            if graph.parents(child).len() != 1 {
                return Err(FlowError::at(
                    FlowErrorKind::Duplicate,
                    "The Target of a DUPLICATE must have only one dependency",
                    graph.name(child),
                ));
            }
            if graph.task(child).flow_block == FlowBlock::End {
                return Err(FlowError::at(
                    FlowErrorKind::Duplicate,
                    "The target of a DUPLICATE cannot be the end of a task block",
                    graph.name(child),
                ));
            }

            let merge = block_starting_at(blocks, child).map_or(child, |b| b.end);
            if graph.children(merge).is_empty() {
                return Err(FlowError::at(
                    FlowErrorKind::Duplicate,
                    "No merge point for DUPLICATE block",
                    graph.name(merge),
                ));
            }
            if matches!(
                graph.task(merge).action_kind(),
                FlowActionKind::Duplicate | FlowActionKind::If
            ) {
                return Err(FlowError::at(
                    FlowErrorKind::Duplicate,
                    "Last action of a DUPLICATE block cannot perform IF or DUPLICATE action",
                    graph.name(merge),
                ));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// LOOP
// ---------------------------------------------------------------------------

/// A LOOP must close a task block opened by its target, or loop on itself.
pub fn check_loop(graph: &FlowGraph<'_>, blocks: &[Block]) -> Result<(), FlowError> {
    for id in graph.ids() {
        let task = graph.task(id);
        let Some(action) = task.action_of(FlowActionKind::Loop) else {
            continue;
        };
        let Some(target) = action.target.as_deref().and_then(|t| graph.find(t)) else {
            return Err(FlowError::at(
                FlowErrorKind::Loop,
                "LOOP action has no target",
                &task.name,
            ));
        };

        let closes_block = blocks.iter().any(|b| b.start == target && b.end == id);
        let loops_on_itself = target == id && task.flow_block == FlowBlock::None;
        if !(closes_block || loops_on_itself) {
            return Err(FlowError::at(
                FlowErrorKind::Loop,
                "The scope of a LOOP action should be a Task Block",
                &task.name,
            )
            .with_task(graph.name(target)));
        }

        if graph.parents(target).len() > 1 {
            return Err(FlowError::at(
                FlowErrorKind::Loop,
                "The Target of a LOOP must have only one dependency",
                graph.name(target),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IF / ELSE / JOIN
// ---------------------------------------------------------------------------

pub fn check_if(graph: &FlowGraph<'_>, blocks: &[Block]) -> Result<(), FlowError> {
    for id in graph.ids() {
        let task = graph.task(id);
        let Some(action) = task.action_of(FlowActionKind::If) else {
            continue;
        };
        let resolve = |name: Option<&str>| name.and_then(|n| graph.find(n));

        let Some(target_if) = resolve(action.target.as_deref()) else {
            return Err(FlowError::at(
                FlowErrorKind::If,
                "IF action has no target",
                &task.name,
            ));
        };
        let Some(target_else) = resolve(action.target_else.as_deref()) else {
            return Err(FlowError::at(
                FlowErrorKind::If,
                "IF action has no ELSE target",
                &task.name,
            ));
        };
        if target_if == target_else {
            return Err(FlowError::at(
                FlowErrorKind::If,
                "IF and ELSE targets are the same",
                graph.name(target_if),
            )
            .with_task(graph.name(target_else)));
        }

        match resolve(action.join.as_deref()) {
            None => check_loose_branches(graph, target_if, target_else)?,
            Some(join) => check_joined_branches(graph, blocks, target_if, target_else, join)?,
        }
    }
    Ok(())
}

/// Without a join each branch is a free-standing sub-DAG rooted at its target.
fn check_loose_branches(
    graph: &FlowGraph<'_>,
    target_if: NodeId,
    target_else: NodeId,
) -> Result<(), FlowError> {
    if !graph.parents(target_if).is_empty() {
        return Err(FlowError::at(
            FlowErrorKind::If,
            "IF target task cannot have dependencies",
            graph.name(target_if),
        ));
    }
    if !graph.parents(target_else).is_empty() {
        return Err(FlowError::at(
            FlowErrorKind::If,
            "IF target task ELSE cannot have dependencies",
            graph.name(target_else),
        ));
    }

    for target in [target_if, target_else] {
        let mut cleared = HashSet::new();
        for member in branch_members(graph, target) {
            if member == target {
                continue;
            }
            check_block_up(graph, target, member, &mut cleared).map_err(|e| {
                FlowError::new(
                    FlowErrorKind::If,
                    format!("IF block at {} has external dependencies", graph.name(target)),
                )
                .with_tasks_from(&e)
            })?;
        }
    }
    Ok(())
}

/// Every node reachable from `target` through dependencies and IF branches,
/// in discovery order.
fn branch_members(graph: &FlowGraph<'_>, target: NodeId) -> Vec<NodeId> {
    let tree = EdgeFiltered::from_fn(&graph.graph, |e| *e.weight() != Link::Join);
    let mut dfs = Dfs::new(&tree, target);
    let mut members = Vec::new();
    while let Some(member) = dfs.next(&tree) {
        members.push(member);
    }
    members
}

/// With a join both branches are task blocks merging into the join and nothing else.
fn check_joined_branches(
    graph: &FlowGraph<'_>,
    blocks: &[Block],
    target_if: NodeId,
    target_else: NodeId,
    join: NodeId,
) -> Result<(), FlowError> {
    let if_block = branch_block(graph, blocks, target_if).ok_or_else(|| {
        FlowError::at(
            FlowErrorKind::If,
            "IF action target is not a Task Block",
            graph.name(target_if),
        )
    })?;
    let else_block = branch_block(graph, blocks, target_else).ok_or_else(|| {
        FlowError::at(
            FlowErrorKind::If,
            "IF action ELSE target is not a Task Block",
            graph.name(target_else),
        )
    })?;

    if graph
        .incoming_joins(join)
        .iter()
        .any(|&end| end != if_block.end && end != else_block.end)
    {
        return Err(FlowError::at(
            FlowErrorKind::If,
            "JOIN task merges multiple IF actions",
            graph.name(join),
        ));
    }

    let boundaries = [
        (
            !graph.parents(if_block.start).is_empty(),
            "IF task block cannot have dependencies",
            if_block.start,
        ),
        (
            !graph.children(if_block.end).is_empty(),
            "IF task block cannot have children",
            if_block.end,
        ),
        (
            !graph.parents(else_block.start).is_empty(),
            "ELSE task block cannot have dependencies",
            else_block.start,
        ),
        (
            !graph.children(else_block.end).is_empty(),
            "ELSE task block cannot have children",
            else_block.end,
        ),
        (
            !graph.parents(join).is_empty(),
            "JOIN task cannot have dependencies",
            join,
        ),
    ];
    for (violated, message, culprit) in boundaries {
        if violated {
            return Err(FlowError::at(FlowErrorKind::If, message, graph.name(culprit)));
        }
    }
    Ok(())
}

/// The block a branch opens, or a single-task block when the branch is one leaf task.
fn branch_block(graph: &FlowGraph<'_>, blocks: &[Block], target: NodeId) -> Option<Block> {
    block_starting_at(blocks, target).or_else(|| {
        let leaf = graph.children(target).is_empty() && graph.branch_targets(target).is_empty();
        leaf.then_some(Block {
            start: target,
            end: target,
        })
    })
}
