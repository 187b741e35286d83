//! Scoped ownership of a solver handle.

use crate::backend::{NlpSolver, SolverBackend};
use crate::error::{SolverError, SolverResult};
use crate::field::{Field, field_len};
use crate::marshal::expect_len;
use crate::status::SolveStatus;
use rsm_ocp::{OcpDims, OcpProblem};
use tracing::{debug, error, info};

/// Exclusive owner of one solver handle.
///
/// Every `get`/`set` is checked against the problem layout before it reaches
/// the backend. The handle is freed by [`SolverSession::release`] or, if that
/// never happens, when the session is dropped; never twice.
pub struct SolverSession {
    solver: Option<Box<dyn NlpSolver>>,
    dims: OcpDims,
    backend: String,
}

impl SolverSession {
    pub fn open(backend: &dyn SolverBackend, problem: &OcpProblem) -> SolverResult<Self> {
        let solver = backend.create(problem)?;
        info!(backend = backend.name(), n = problem.n(), "Solver created");
        Ok(Self::from_solver(solver, *problem.dims()))
    }

    /// Wrap an already created handle.
    pub fn from_solver(solver: Box<dyn NlpSolver>, dims: OcpDims) -> Self {
        let backend = solver.name().to_string();
        Self {
            solver: Some(solver),
            dims,
            backend,
        }
    }

    pub fn dims(&self) -> &OcpDims {
        &self.dims
    }

    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    pub fn is_live(&self) -> bool {
        self.solver.is_some()
    }

    fn live(&self) -> SolverResult<&dyn NlpSolver> {
        self.solver.as_deref().ok_or(SolverError::AlreadyReleased)
    }

    fn live_mut(&mut self) -> SolverResult<&mut (dyn NlpSolver + 'static)> {
        self.solver.as_deref_mut().ok_or(SolverError::AlreadyReleased)
    }

    fn layout(&self, stage: usize, field: Field) -> SolverResult<usize> {
        field_len(&self.dims, stage, field).ok_or_else(|| {
            SolverError::interface(field, stage, "field is not defined at this stage")
        })
    }

    pub fn solve(&mut self) -> SolverResult<SolveStatus> {
        let status = self.live_mut()?.solve()?;
        debug!(status = %status, "solve returned");
        Ok(status)
    }

    pub fn get(&self, stage: usize, field: Field) -> SolverResult<Vec<f64>> {
        let expected = self.layout(stage, field)?;
        let values = self.live()?.get(stage, field)?;
        expect_len(field, stage, expected, values.len())?;
        Ok(values)
    }

    pub fn set(&mut self, stage: usize, field: Field, values: &[f64]) -> SolverResult<()> {
        let expected = self.layout(stage, field)?;
        expect_len(field, stage, expected, values.len())?;
        if let Some(v) = values.iter().find(|v| v.is_nan()) {
            return Err(SolverError::interface(field, stage, format!("value {v} is not a number")));
        }
        self.live_mut()?.set(stage, field, values)
    }

    /// `get` with the field given by name.
    pub fn get_named(&self, stage: usize, name: &str) -> SolverResult<Vec<f64>> {
        self.get(stage, name.parse()?)
    }

    /// `set` with the field given by name.
    pub fn set_named(&mut self, stage: usize, name: &str, values: &[f64]) -> SolverResult<()> {
        self.set(stage, name.parse()?, values)
    }

    /// Free the handle. A second call reports [`SolverError::AlreadyReleased`].
    pub fn release(&mut self) -> SolverResult<()> {
        let mut solver = self.solver.take().ok_or(SolverError::AlreadyReleased)?;
        info!(backend = %self.backend, "Releasing solver");
        solver.free()
    }
}

impl Drop for SolverSession {
    fn drop(&mut self) {
        if let Some(mut solver) = self.solver.take() {
            if let Err(e) = solver.free() {
                error!(backend = %self.backend, error = %e, "Failed to free solver on drop");
            }
        }
    }
}
