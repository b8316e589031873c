pub mod error;
pub mod parse;
pub mod validate;
pub mod wasm;

pub use error::{FlowError, FlowErrorKind};
pub use validate::{Validation, validate, validate_job};
