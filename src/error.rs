//! Unified validation error type used across graph building and every check.

use serde::Serialize;
use thiserror::Error;

/// Which rule family rejected the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowErrorKind {
    Parse,
    Name,
    Unreachable,
    Recursion,
    Block,
    Duplicate,
    Loop,
    If,
}

impl std::fmt::Display for FlowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowErrorKind::Parse => write!(f, "PARSE"),
            FlowErrorKind::Name => write!(f, "NAME"),
            FlowErrorKind::Unreachable => write!(f, "UNREACHABLE"),
            FlowErrorKind::Recursion => write!(f, "RECURSION"),
            FlowErrorKind::Block => write!(f, "BLOCK"),
            FlowErrorKind::Duplicate => write!(f, "DUPLICATE"),
            FlowErrorKind::Loop => write!(f, "LOOP"),
            FlowErrorKind::If => write!(f, "IF"),
        }
    }
}

/// A rejected job: what went wrong and which tasks are implicated, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("[{kind}] {message} (tasks: {})", .tasks.join(", "))]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub message: String,
    pub tasks: Vec<String>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, message: impl Into<String>) -> Self {
        FlowError {
            kind,
            message: message.into(),
            tasks: Vec::new(),
        }
    }

    /// Shorthand for the common case of a single offending task.
    pub fn at(kind: FlowErrorKind, message: impl Into<String>, task: &str) -> Self {
        FlowError::new(kind, message).with_task(task)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        FlowError::new(FlowErrorKind::Parse, message)
    }

    pub fn with_task(mut self, task: &str) -> Self {
        self.tasks.push(task.to_string());
        self
    }

    /// Appends the tasks implicated by a lower-level error.
    pub fn with_tasks_from(mut self, other: &FlowError) -> Self {
        self.tasks.extend(other.tasks.iter().cloned());
        self
    }
}
