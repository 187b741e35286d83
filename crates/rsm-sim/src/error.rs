//! Error types for closed-loop runs.

use rsm_solver::{SolveStatus, SolverError};
use thiserror::Error;

/// Errors that terminate a closed-loop run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// The solver reported a non-success status. `step` is the zero-based
    /// sampling index of the failed solve.
    #[error("Solve failed at step {step}: {status}")]
    SolveFailure { step: usize, status: SolveStatus },

    #[error("Solver interface error: {message}")]
    Interface { message: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<SolverError> for SimError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Interface { .. } => SimError::Interface {
                message: e.to_string(),
            },
            other => SimError::Backend {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_errors_stay_distinguishable() {
        let e: SimError = SolverError::Interface {
            field: "lbx".into(),
            stage: 1,
            what: "state bounds exist only at stage 0".into(),
        }
        .into();
        assert!(matches!(e, SimError::Interface { ref message } if message.contains("'lbx'")));

        let e: SimError = SolverError::AlreadyReleased.into();
        assert!(matches!(e, SimError::Backend { .. }));
    }

    #[test]
    fn failure_message_names_step_and_status() {
        let e = SimError::SolveFailure {
            step: 3,
            status: SolveStatus::QpFailure,
        };
        let msg = e.to_string();
        assert!(msg.contains("step 3"), "{msg}");
    }
}
