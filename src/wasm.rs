//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::error::FlowError;
use crate::validate::TaskBlock;

/// Validate a job descriptor JSON: parse + flow validation.
/// Returns a JSON object with either `blocks` (valid) or `error` (rejected).
#[wasm_bindgen]
pub fn validate_job(json: &str) -> JsValue {
    let result = validate_job_inner(json);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_job_inner(json: &str) -> ValidationResult {
    let job = match crate::parse::parse(json) {
        Ok(job) => job,
        Err(e) => return ValidationResult::Rejected { error: e.into() },
    };

    match crate::validate::validate_job(&job).into_result() {
        Ok(blocks) => ValidationResult::Valid {
            blocks: blocks.into_iter().map(BlockDto::from).collect(),
        },
        Err(e) => ValidationResult::Rejected { error: e.into() },
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize)]
struct ErrorDto {
    kind: String,
    message: String,
    tasks: Vec<String>,
}

impl From<FlowError> for ErrorDto {
    fn from(e: FlowError) -> Self {
        ErrorDto {
            kind: e.kind.to_string(),
            message: e.message,
            tasks: e.tasks,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct BlockDto {
    start: String,
    end: String,
}

impl From<TaskBlock> for BlockDto {
    fn from(b: TaskBlock) -> Self {
        BlockDto {
            start: b.start,
            end: b.end,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum ValidationResult {
    #[serde(rename = "valid")]
    Valid { blocks: Vec<BlockDto> },
    #[serde(rename = "rejected")]
    Rejected { error: ErrorDto },
}
