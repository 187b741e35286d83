//! Error types for the rsm-app service layer.

use std::path::PathBuf;

/// Unified error for CLI-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Failed to read scenario file: {path}")]
    ScenarioFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Formulation error: {0}")]
    Formulation(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<rsm_project::ProjectError> for AppError {
    fn from(err: rsm_project::ProjectError) -> Self {
        match err {
            rsm_project::ProjectError::Io(e) => AppError::Io(e),
            other => AppError::Scenario(other.to_string()),
        }
    }
}

impl From<rsm_model::ModelError> for AppError {
    fn from(err: rsm_model::ModelError) -> Self {
        AppError::Formulation(err.to_string())
    }
}

impl From<rsm_ocp::FormulationError> for AppError {
    fn from(err: rsm_ocp::FormulationError) -> Self {
        AppError::Formulation(err.to_string())
    }
}

impl From<rsm_solver::SolverError> for AppError {
    fn from(err: rsm_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<rsm_sim::SimError> for AppError {
    fn from(err: rsm_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<rsm_results::ResultsError> for AppError {
    fn from(err: rsm_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
