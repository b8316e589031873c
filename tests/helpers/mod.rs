use flowcheck::parse::*;
use flowcheck::{FlowError, FlowErrorKind, Validation, validate};

// =============================================================================
// Task builders
// =============================================================================

pub fn task(name: &str) -> Task {
    Task::new(name)
}

pub fn dep(name: &str, deps: &[&str]) -> Task {
    Task::new(name).depends_on(deps.iter().copied())
}

pub fn if_task(name: &str, target: &str, target_else: &str, join: Option<&str>) -> Task {
    Task::new(name).with_action(FlowAction::if_else(target, target_else, join))
}

pub fn loop_task(name: &str, target: &str) -> Task {
    Task::new(name).with_action(FlowAction::loop_to(target))
}

pub fn duplicate_task(name: &str) -> Task {
    Task::new(name).with_action(FlowAction::duplicate())
}

pub fn start(t: Task) -> Task {
    t.with_block(FlowBlock::Start)
}

pub fn end(t: Task) -> Task {
    t.with_block(FlowBlock::End)
}

// =============================================================================
// Assertions
// =============================================================================

pub fn assert_valid(tasks: &[Task]) -> Validation {
    let validation = validate(tasks);
    assert!(
        validation.is_valid(),
        "Expected job to be valid, got: {:?}",
        validation.error
    );
    validation
}

pub fn assert_rejected(tasks: &[Task], kind: FlowErrorKind, message: &str) -> FlowError {
    let validation = validate(tasks);
    let error = validation
        .error
        .unwrap_or_else(|| panic!("Expected '{}', but job was accepted", message));
    assert_eq!(error.kind, kind, "Unexpected error kind: {}", error);
    assert_eq!(error.message, message, "Unexpected error: {}", error);
    error
}

pub fn names(error: &FlowError) -> Vec<&str> {
    error.tasks.iter().map(String::as_str).collect()
}
