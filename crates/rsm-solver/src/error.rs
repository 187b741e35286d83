//! Error types for solver operations.

use rsm_ocp::FormulationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Undeclared field or wrongly sized array at the solver boundary.
    #[error("Interface error on '{field}' at stage {stage}: {what}")]
    Interface {
        field: String,
        stage: usize,
        what: String,
    },

    #[error("Solver creation failed: {what}")]
    Create { what: String },

    #[error("Solver handle already released")]
    AlreadyReleased,

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Formulation error: {0}")]
    Formulation(#[from] FormulationError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub(crate) fn interface(field: impl ToString, stage: usize, what: impl Into<String>) -> Self {
        SolverError::Interface {
            field: field.to_string(),
            stage,
            what: what.into(),
        }
    }
}
