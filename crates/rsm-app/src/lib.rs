//! Shared application service layer for the current-controller workspace.
//!
//! Turns scenario files into assembled problems, runs the closed loop on a
//! chosen backend, and stores or exports the results. The CLI is a thin
//! shell over these functions.

pub mod backend;
pub mod error;
pub mod run_service;
pub mod scenario_service;

pub use backend::{BackendKind, make_backend};
pub use error::{AppError, AppResult};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, ensure_run, export_run, list_runs, load_run,
};
pub use rsm_results::{RunManifest, RunOutcome};
pub use scenario_service::{formulate, load_scenario, settings_from_scenario};
