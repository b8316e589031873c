//! petgraph-based flow graph over a job's tasks.
//!
//! Every task is one node; dependencies, IF branches and joins are edges
//! tagged with a [`Link`]. All edges point downstream, in the direction the
//! job executes. The graph borrows the tasks and never mutates them.

use std::collections::{HashMap, HashSet};

use petgraph::Direction::{self, Incoming, Outgoing};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::trace;

use super::types::{FlowActionKind, Task};
use crate::error::{FlowError, FlowErrorKind};

pub type NodeId = NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Parent to dependent task.
    Dependency,
    /// IF task to one of its IF/ELSE targets.
    Branch,
    /// Last node of an IF branch to the join closing it.
    Join,
}

#[derive(Debug)]
pub struct FlowGraph<'a> {
    pub graph: DiGraph<&'a Task, Link>,
    pub node_indices: HashMap<&'a str, NodeId>,
    /// Nodes without dependencies, in job order.
    pub roots: Vec<NodeId>,
}

impl<'a> FlowGraph<'a> {
    pub fn build(tasks: &'a [Task]) -> Result<Self, FlowError> {
        let mut flow = FlowGraph {
            graph: DiGraph::with_capacity(tasks.len(), tasks.len()),
            node_indices: HashMap::with_capacity(tasks.len()),
            roots: Vec::new(),
        };

        // Add all nodes
        let ids: Vec<NodeId> = tasks
            .iter()
            .map(|task| {
                let idx = flow.graph.add_node(task);
                flow.node_indices.insert(task.name.as_str(), idx);
                idx
            })
            .collect();

        // Add dependency and branch edges
        for (&id, task) in ids.iter().zip(tasks) {
            // Unknown dependency names are left dangling; reachability reports them.
            if task.dependencies.is_empty() {
                flow.roots.push(id);
            }
            for dep in &task.dependencies {
                if let Some(parent) = flow.find(dep) {
                    flow.graph.add_edge(parent, id, Link::Dependency);
                }
            }
            flow.link_branches(id, task)?;
        }

        flow.link_joins();
        Ok(flow)
    }

    fn link_branches(&mut self, id: NodeId, task: &Task) -> Result<(), FlowError> {
        let Some(action) = task.action_of(FlowActionKind::If) else {
            return Ok(());
        };

        let branches = [
            (action.target.as_deref(), "IF target is null"),
            (action.target_else.as_deref(), "ELSE target if null"),
        ];
        for (name, missing) in branches {
            let Some(name) = name else { continue };
            let Some(branch) = self.find(name) else {
                return Err(FlowError::at(FlowErrorKind::If, missing, &task.name));
            };
            match self.branch_of(branch) {
                Some(owner) if owner == id => {}
                Some(_) => {
                    return Err(FlowError::at(
                        FlowErrorKind::If,
                        "Task is target of multiple IF actions",
                        name,
                    ));
                }
                None => {
                    self.graph.add_edge(id, branch, Link::Branch);
                }
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.node_indices.get(name).copied()
    }

    pub fn task(&self, id: NodeId) -> &'a Task {
        self.graph[id]
    }

    pub fn name(&self, id: NodeId) -> &'a str {
        let task: &'a Task = self.graph[id];
        &task.name
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        self.graph.node_indices()
    }

    /// Neighbours over edges of one kind, in the order the edges were added.
    fn linked(&self, id: NodeId, direction: Direction, kind: Link) -> Vec<NodeId> {
        let mut linked: Vec<NodeId> = self
            .graph
            .edges_directed(id, direction)
            .filter(|e| *e.weight() == kind)
            .map(|e| match direction {
                Outgoing => e.target(),
                Incoming => e.source(),
            })
            .collect();
        // petgraph yields the newest edge first.
        linked.reverse();
        linked
    }

    /// Tasks depending on this one.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.linked(id, Outgoing, Link::Dependency)
    }

    /// Tasks this one depends on.
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.linked(id, Incoming, Link::Dependency)
    }

    /// IF/ELSE targets of this task's IF action.
    pub fn branch_targets(&self, id: NodeId) -> Vec<NodeId> {
        self.linked(id, Outgoing, Link::Branch)
    }

    /// The IF task this node is a branch target of.
    pub fn branch_of(&self, id: NodeId) -> Option<NodeId> {
        self.graph
            .edges_directed(id, Incoming)
            .find(|e| *e.weight() == Link::Branch)
            .map(|e| e.source())
    }

    /// Resolved join of this task's IF action.
    pub fn join_target(&self, id: NodeId) -> Option<NodeId> {
        self.task(id).if_join().and_then(|j| self.find(j))
    }

    /// Last nodes of the IF branches merged by this join node.
    pub fn incoming_joins(&self, id: NodeId) -> Vec<NodeId> {
        self.linked(id, Incoming, Link::Join)
    }

    /// The join node this branch end merges into.
    pub fn outgoing_join(&self, id: NodeId) -> Option<NodeId> {
        self.graph
            .edges_directed(id, Outgoing)
            .find(|e| *e.weight() == Link::Join)
            .map(|e| e.target())
    }

    /// Every top-down link: dependency children, IF branches, then outgoing joins.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut next = self.children(id);
        next.extend(self.branch_targets(id));
        next.extend(self.linked(id, Outgoing, Link::Join));
        next
    }

    /// Every bottom-up link: dependency parents, incoming joins, then the owning IF.
    pub fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut prev = self.parents(id);
        prev.extend(self.incoming_joins(id));
        prev.extend(self.branch_of(id));
        prev
    }

    // -----------------------------------------------------------------------
    // Join resolution
    // -----------------------------------------------------------------------

    /// Links the last node of each branch of every joined IF to its join node.
    fn link_joins(&mut self) {
        for id in self.graph.node_indices() {
            let task = self.task(id);
            let Some(join_name) = task.if_join() else {
                continue;
            };
            let (Some(action), Some(join)) = (task.flow_action.as_ref(), self.find(join_name))
            else {
                continue;
            };

            for branch in [action.target.as_deref(), action.target_else.as_deref()] {
                let Some(start) = branch.and_then(|b| self.find(b)) else {
                    continue;
                };
                let last = self.walk_to_branch_end(start);
                trace!(
                    branch_end = self.name(last),
                    join = join_name,
                    "linking IF branch to join"
                );
                self.graph.add_edge(last, join, Link::Join);
            }
        }
    }

    /// Follows a branch from its first node to the node that merges into the join.
    ///
    /// Nested IFs with their own join push that join on a pending stack; when a
    /// chain runs dry the innermost pending join is resumed, so the outer join
    /// always closes after every inner one.
    fn walk_to_branch_end(&self, start: NodeId) -> NodeId {
        let mut pending: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = start;

        loop {
            seen.insert(current);
            let task = self.task(current);
            if let Some(join) = task.if_join() {
                pending.push(join);
            }

            let else_target = task
                .action_of(FlowActionKind::If)
                .and_then(|a| a.target_else.as_deref());
            let next = self
                .children(current)
                .first()
                .copied()
                .or_else(|| else_target.and_then(|n| self.find(n)))
                .or_else(|| pending.pop().and_then(|n| self.find(n)));

            match next {
                Some(next) if !seen.contains(&next) => current = next,
                _ => return current,
            }
        }
    }
}
