//! Error types for problem assembly.

use rsm_core::CoreError;
use rsm_model::ModelError;
use thiserror::Error;

/// Inconsistent problem wiring detected before any solver interaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulationError {
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Constraint block '{block}' is declared but has no expression")]
    MissingExpression { block: &'static str },

    #[error("Index {index} in {what} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("Invalid setting: {what}")]
    InvalidSetting { what: String },

    #[error("Inconsistent bounds in {what}[{index}]: lower {lower} > upper {upper}")]
    InconsistentBounds {
        what: &'static str,
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error("Undeclared symbol '{name}' in {context}")]
    UndeclaredSymbol { name: String, context: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

pub type FormulationResult<T> = Result<T, FormulationError>;

pub(crate) fn check_len(what: &str, expected: usize, actual: usize) -> FormulationResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(FormulationError::DimensionMismatch {
            what: what.to_string(),
            expected,
            actual,
        })
    }
}

pub(crate) fn check_shape(
    what: &str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> FormulationResult<()> {
    check_len(&format!("{what} rows"), expected.0, actual.0)?;
    check_len(&format!("{what} cols"), expected.1, actual.1)
}
