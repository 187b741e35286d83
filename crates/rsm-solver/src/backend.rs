//! Solver traits.

use crate::error::SolverResult;
use crate::field::Field;
use crate::status::SolveStatus;
use rsm_ocp::OcpProblem;

/// A live solver handle.
///
/// Implementations may assume `stage`/`field` pairs and array lengths have
/// already been checked by [`crate::SolverSession`].
pub trait NlpSolver {
    fn name(&self) -> &str;

    /// One real-time iteration.
    fn solve(&mut self) -> SolverResult<SolveStatus>;

    fn get(&self, stage: usize, field: Field) -> SolverResult<Vec<f64>>;

    fn set(&mut self, stage: usize, field: Field, values: &[f64]) -> SolverResult<()>;

    /// Release the handle's resources. Called once by the owning session.
    fn free(&mut self) -> SolverResult<()>;
}

/// Factory producing a solver for an assembled problem.
pub trait SolverBackend {
    fn name(&self) -> &'static str;

    fn create(&self, problem: &OcpProblem) -> SolverResult<Box<dyn NlpSolver>>;
}
