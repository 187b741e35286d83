//! Error types for model construction and evaluation.

use rsm_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Undeclared symbol '{name}' in {context}")]
    UndeclaredSymbol { name: String, context: String },

    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type ModelResult<T> = Result<T, ModelError>;
