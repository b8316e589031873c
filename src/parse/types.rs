//! Task model of a job descriptor.
//!
//! These types are the serde target for job descriptor JSON and the
//! read-only input of every validation run. Nothing in the validator
//! mutates them.

use serde::{Deserialize, Serialize};

/// Separator the runtime uses to name loop iterations (`task#2`).
pub const ITERATION_SEPARATOR: char = '#';

/// Separator the runtime uses to name duplicated replicas (`task*3`).
pub const REPLICATION_SEPARATOR: char = '*';

// =============================================================================
// TOP-LEVEL JOB
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub tasks: Vec<Task>,
}

// =============================================================================
// TASK
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    /// Names of the tasks this one depends on. Empty means the task is a root.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub flow_action: Option<FlowAction>,
    #[serde(default)]
    pub flow_block: FlowBlock,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            dependencies: Vec::new(),
            flow_action: None,
            flow_block: FlowBlock::None,
        }
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_action(mut self, action: FlowAction) -> Self {
        self.flow_action = Some(action);
        self
    }

    pub fn with_block(mut self, block: FlowBlock) -> Self {
        self.flow_block = block;
        self
    }

    pub fn action_kind(&self) -> FlowActionKind {
        self.flow_action
            .as_ref()
            .map_or(FlowActionKind::None, |a| a.kind)
    }

    pub fn is_if(&self) -> bool {
        self.action_kind() == FlowActionKind::If
    }

    /// The action descriptor, only when it is of the given kind.
    pub fn action_of(&self, kind: FlowActionKind) -> Option<&FlowAction> {
        self.flow_action.as_ref().filter(|a| a.kind == kind)
    }

    /// Join name of an IF action, ignoring empty strings.
    pub fn if_join(&self) -> Option<&str> {
        self.action_of(FlowActionKind::If)
            .and_then(|a| a.join.as_deref())
            .filter(|j| !j.is_empty())
    }
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAction {
    pub kind: FlowActionKind,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub target_else: Option<String>,
    #[serde(default)]
    pub join: Option<String>,
}

impl FlowAction {
    pub fn if_else(
        target: impl Into<String>,
        target_else: impl Into<String>,
        join: Option<&str>,
    ) -> Self {
        FlowAction {
            kind: FlowActionKind::If,
            target: Some(target.into()),
            target_else: Some(target_else.into()),
            join: join.map(str::to_string),
        }
    }

    pub fn loop_to(target: impl Into<String>) -> Self {
        FlowAction {
            kind: FlowActionKind::Loop,
            target: Some(target.into()),
            target_else: None,
            join: None,
        }
    }

    pub fn duplicate() -> Self {
        FlowAction {
            kind: FlowActionKind::Duplicate,
            target: None,
            target_else: None,
            join: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowActionKind {
    #[default]
    #[serde(alias = "CONTINUE")]
    None,
    If,
    Loop,
    #[serde(alias = "REPLICATE")]
    Duplicate,
}

/// Marks the first or last task of a nested sub-workflow scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowBlock {
    #[default]
    None,
    Start,
    End,
}
