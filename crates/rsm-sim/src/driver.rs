//! Closed-loop driver: one RTI solve per sampling instant.

use crate::error::{SimError, SimResult};
use crate::log::TrajectoryLog;
use crate::stats::StepStats;
use rsm_core::Timer;
use rsm_ocp::OcpProblem;
use rsm_solver::{Field, SolverBackend, SolverSession};
use tracing::{debug, error, info, warn};

/// Options for closed-loop runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosedLoopOptions {
    /// Number of sampling instants to run.
    pub n_sim: usize,
    /// Sampling period (seconds)
    pub ts: f64,
}

impl Default for ClosedLoopOptions {
    fn default() -> Self {
        Self {
            n_sim: 100,
            ts: 0.0008,
        }
    }
}

impl ClosedLoopOptions {
    fn validate(&self) -> SimResult<()> {
        if !(self.ts.is_finite() && self.ts > 0.0) {
            return Err(SimError::InvalidArg {
                what: "ts must be positive and finite",
            });
        }
        Ok(())
    }
}

/// Runs the controller for a fixed number of steps.
///
/// Each step solves, reads `u_0`, `x_0` and `x_1`, appends `(x_0, u_0)` to
/// the log and pins the stage-0 state bounds to `x_1`. Steps never overlap.
/// The first non-success status ends the run; the solver handle is released
/// on every exit path.
pub struct ClosedLoopDriver {
    session: SolverSession,
    options: ClosedLoopOptions,
    log: TrajectoryLog,
    stats: StepStats,
    done: bool,
}

impl ClosedLoopDriver {
    pub fn new(session: SolverSession, options: ClosedLoopOptions) -> SimResult<Self> {
        options.validate()?;
        Ok(Self {
            session,
            log: TrajectoryLog::with_capacity(options.n_sim),
            stats: StepStats::new(options.ts),
            options,
            done: false,
        })
    }

    /// Create a solver for `problem` and a driver sampling at its `Ts`.
    pub fn open(backend: &dyn SolverBackend, problem: &OcpProblem, n_sim: usize) -> SimResult<Self> {
        let session = SolverSession::open(backend, problem)?;
        Self::new(
            session,
            ClosedLoopOptions {
                n_sim,
                ts: problem.ts(),
            },
        )
    }

    pub fn options(&self) -> &ClosedLoopOptions {
        &self.options
    }

    pub fn log(&self) -> &TrajectoryLog {
        &self.log
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    pub fn backend_name(&self) -> &str {
        self.session.backend_name()
    }

    pub fn into_log(self) -> TrajectoryLog {
        self.log
    }

    /// Run all `n_sim` steps and release the solver.
    ///
    /// On failure the log keeps the steps completed before it. A driver runs
    /// once; a second call is rejected.
    pub fn run(&mut self) -> SimResult<&TrajectoryLog> {
        if self.done {
            return Err(SimError::InvalidArg {
                what: "closed loop already ran",
            });
        }
        self.done = true;
        info!(
            backend = self.session.backend_name(),
            n_sim = self.options.n_sim,
            ts = self.options.ts,
            "Closed loop starting"
        );

        let outcome = self.steps();
        let released = self.session.release();
        outcome?;
        released?;

        let s = self.stats.summary();
        info!(
            steps = s.steps,
            mean_solve_s = s.mean_s,
            max_solve_s = s.max_s,
            overruns = s.overruns,
            "Closed loop finished"
        );
        Ok(&self.log)
    }

    fn steps(&mut self) -> SimResult<()> {
        for k in 0..self.options.n_sim {
            self.step(k)?;
        }
        Ok(())
    }

    fn step(&mut self, k: usize) -> SimResult<()> {
        let timer = Timer::start("solve");
        let status = self.session.solve()?;
        let elapsed = timer.stop();
        if self.stats.record(elapsed) {
            warn!(step = k, solve_s = elapsed, ts = self.options.ts, "Solve overran sampling period");
        }

        if !status.is_success() {
            error!(step = k, status = %status, "Solve failed, aborting closed loop");
            return Err(SimError::SolveFailure { step: k, status });
        }

        let u0 = self.session.get(0, Field::U)?;
        let x0 = self.session.get(0, Field::X)?;
        let x1 = self.session.get(1, Field::X)?;

        let t = k as f64 * self.options.ts;
        debug!(step = k, t, status = %status, solve_s = elapsed, ?u0, "Step complete");
        self.log.push(t, x0, u0, elapsed);

        self.session.set(0, Field::Lbx, &x1)?;
        self.session.set(0, Field::Ubx, &x1)?;
        Ok(())
    }
}
