//! Result data types.

use rsm_project::ScenarioDef;
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub scenario_name: String,
    pub timestamp: String,
    pub formulation: String,
    pub backend: String,
    pub n_sim: usize,
    /// Steps logged before the run ended.
    pub steps: usize,
    pub outcome: RunOutcome,
    #[serde(default)]
    pub timing: TimingSummary,
}

impl RunManifest {
    /// Manifest stamped with the current UTC time.
    pub fn new(
        run_id: RunId,
        scenario: &ScenarioDef,
        backend: &str,
        steps: usize,
        outcome: RunOutcome,
        timing: TimingSummary,
    ) -> Self {
        Self {
            run_id,
            scenario_name: scenario.name.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            formulation: scenario.actuation.formulation.to_string(),
            backend: backend.to_string(),
            n_sim: scenario.closed_loop.n_sim,
            steps,
            outcome,
            timing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunOutcome {
    Completed,
    SolveFailed { step: usize, status_code: i32 },
    Aborted { message: String },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimingSummary {
    pub mean_solve_s: f64,
    pub max_solve_s: f64,
    pub overruns: usize,
}
