//! Run execution and caching service.

use std::io::Write;
use std::path::Path;

use rsm_project::ScenarioDef;
use rsm_results::{
    ResultsError, RunManifest, RunOutcome, RunStore, TimingSummary, compute_run_id, write_csv,
};
use rsm_sim::{ClosedLoopDriver, SimError, StatsSummary, TrajectoryLog};
use rsm_solver::SolverBackend;
use tracing::info;

use crate::error::AppResult;
use crate::scenario_service;

/// Options for running a scenario.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Reuse a stored completed run with the same id.
    pub use_cache: bool,
    /// Write manifest and trajectory to the run store.
    pub store: bool,
    /// Override of `closed_loop.n_sim`.
    pub n_sim: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            store: true,
            n_sim: None,
        }
    }
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub scenario_path: &'a Path,
    pub options: RunOptions,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub log: TrajectoryLog,
    pub loaded_from_cache: bool,
    /// Present when the loop actually ran.
    pub stats: Option<StatsSummary>,
}

fn timing_of(stats: &StatsSummary) -> TimingSummary {
    TimingSummary {
        mean_solve_s: stats.mean_s,
        max_solve_s: stats.max_s,
        overruns: stats.overruns,
    }
}

fn outcome_of(result: &Result<(), SimError>) -> RunOutcome {
    match result {
        Ok(()) => RunOutcome::Completed,
        Err(SimError::SolveFailure { step, status }) => RunOutcome::SolveFailed {
            step: *step,
            status_code: status.code(),
        },
        Err(other) => RunOutcome::Aborted {
            message: other.to_string(),
        },
    }
}

/// Execute or load a run.
///
/// A run that ends in a solve failure is still stored (with the steps that
/// completed) before the failure is returned.
pub fn ensure_run(request: &RunRequest, backend: &dyn SolverBackend) -> AppResult<RunResponse> {
    let mut scenario = scenario_service::load_scenario(request.scenario_path)?;
    if let Some(n_sim) = request.options.n_sim {
        scenario.closed_loop.n_sim = n_sim;
    }
    run_scenario(&scenario, request.scenario_path, &request.options, backend)
}

fn run_scenario(
    scenario: &ScenarioDef,
    scenario_path: &Path,
    options: &RunOptions,
    backend: &dyn SolverBackend,
) -> AppResult<RunResponse> {
    let run_id = compute_run_id(scenario, backend.name())?;

    if options.use_cache
        && let Some(store) = RunStore::existing_for_scenario(scenario_path)?
        && store.has_run(&run_id)
    {
        let manifest = store.load_manifest(&run_id)?;
        if manifest.outcome.is_completed() {
            info!(run_id = %run_id, "Loaded run from cache");
            let log = store.load_trajectory(&run_id)?;
            return Ok(RunResponse {
                run_id,
                manifest,
                log,
                loaded_from_cache: true,
                stats: None,
            });
        }
    }

    let problem = scenario_service::formulate(scenario)?;
    let mut driver = ClosedLoopDriver::open(backend, &problem, scenario.closed_loop.n_sim)?;
    let result = driver.run().map(|_| ());

    let stats = driver.stats().summary();
    let manifest = RunManifest::new(
        run_id.clone(),
        scenario,
        backend.name(),
        driver.log().len(),
        outcome_of(&result),
        timing_of(&stats),
    );
    let log = driver.into_log();

    if options.store {
        let store = RunStore::for_scenario(scenario_path)?;
        store.save_run(&manifest, &log)?;
        info!(run_id = %run_id, steps = log.len(), "Stored run");
    }

    result?;
    Ok(RunResponse {
        run_id,
        manifest,
        log,
        loaded_from_cache: false,
        stats: Some(stats),
    })
}

/// Stored runs next to a scenario file, most recent first.
pub fn list_runs(scenario_path: &Path) -> AppResult<Vec<RunManifest>> {
    let Some(store) = RunStore::existing_for_scenario(scenario_path)? else {
        return Ok(Vec::new());
    };
    let mut runs = store.list_runs()?;
    runs.reverse();
    Ok(runs)
}

/// Load a stored run by id or unique id prefix.
pub fn load_run(scenario_path: &Path, run_id: &str) -> AppResult<(RunManifest, TrajectoryLog)> {
    let store = RunStore::existing_for_scenario(scenario_path)?.ok_or_else(|| {
        ResultsError::RunNotFound {
            run_id: run_id.to_string(),
        }
    })?;
    let run_id = store.resolve(run_id)?;
    let manifest = store.load_manifest(&run_id)?;
    let log = store.load_trajectory(&run_id)?;
    Ok((manifest, log))
}

/// Write a stored trajectory as CSV to `output`, or to stdout.
pub fn export_run(scenario_path: &Path, run_id: &str, output: Option<&Path>) -> AppResult<()> {
    let (_, log) = load_run(scenario_path, run_id)?;
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_csv(log.entries(), std::io::BufWriter::new(file))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_csv(log.entries(), &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_solver::SolveStatus;

    #[test]
    fn outcome_records_failure_step_and_code() {
        let r = Err(SimError::SolveFailure {
            step: 7,
            status: SolveStatus::QpFailure,
        });
        assert_eq!(
            outcome_of(&r),
            RunOutcome::SolveFailed {
                step: 7,
                status_code: 4
            }
        );
        assert_eq!(outcome_of(&Ok(())), RunOutcome::Completed);
        let aborted = outcome_of(&Err(SimError::InvalidArg { what: "ts" }));
        assert!(matches!(aborted, RunOutcome::Aborted { .. }));
    }
}
