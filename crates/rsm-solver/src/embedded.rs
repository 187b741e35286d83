//! In-process real-time-iteration backend.
//!
//! Each `solve` performs one Gauss-Newton step on the control sequence of a
//! single-shooting transcription:
//!
//! 1. fix `x_0` from the stage-0 state bounds and roll the DAE out with
//!    [`ImplicitEuler`];
//! 2. stack the weighted tracking residuals `W^½·(y_k − yref_k)` and
//!    differentiate them by finite differences;
//! 3. take the regularised Gauss-Newton step and restore feasibility stage by
//!    stage: clamp the box bounds, then scale `u_k` radially until the general
//!    and nonlinear constraints hold.
//!
//! It is not a replacement for a structure-exploiting QP solver; it lets the
//! closed loop run against the same problem description without one.

use crate::backend::{NlpSolver, SolverBackend};
use crate::error::{SolverError, SolverResult};
use crate::field::Field;
use crate::integrator::ImplicitEuler;
use crate::marshal::to_dvector;
use crate::status::SolveStatus;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rsm_core::jacobian::finite_difference_jacobian;
use rsm_core::{CoreError, CoreResult, NewtonConfig};
use rsm_model::NonlinearConstraint;
use rsm_ocp::{LinearLsCost, OcpDims, OcpProblem};
use tracing::{debug, warn};

/// Tuning of the embedded iteration.
#[derive(Clone, Debug)]
pub struct RtiConfig {
    /// Newton settings of the implicit integrator.
    pub integrator: NewtonConfig,
    /// Relative perturbation for the finite-difference Jacobian.
    pub fd_epsilon: f64,
    /// Levenberg term added to the Gauss-Newton Hessian.
    pub regularization: f64,
    /// Bisection steps of the radial projection.
    pub projection_iters: usize,
    /// Relative slack accepted on constraint bounds.
    pub feasibility_tol: f64,
}

impl Default for RtiConfig {
    fn default() -> Self {
        Self {
            integrator: NewtonConfig::default(),
            fd_epsilon: 1e-6,
            regularization: 1e-12,
            projection_iters: 60,
            feasibility_tol: 1e-9,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EmbeddedRti {
    pub config: RtiConfig,
}

impl EmbeddedRti {
    pub fn new(config: RtiConfig) -> Self {
        Self { config }
    }
}

impl SolverBackend for EmbeddedRti {
    fn name(&self) -> &'static str {
        "embedded-rti"
    }

    fn create(&self, problem: &OcpProblem) -> SolverResult<Box<dyn NlpSolver>> {
        Ok(Box::new(EmbeddedSolver::new(problem, self.config.clone())?))
    }
}

/// Per-stage problem data that `set` may overwrite.
#[derive(Clone, Debug, Default)]
struct StageData {
    lbu: Vec<f64>,
    ubu: Vec<f64>,
    lg: Vec<f64>,
    ug: Vec<f64>,
    lh: Vec<f64>,
    uh: Vec<f64>,
    p: Vec<f64>,
    yref: Vec<f64>,
}

/// Primal trajectory of one iterate.
struct Trajectory {
    x: Vec<DVector<f64>>,
    u: Vec<DVector<f64>>,
    z: Vec<DVector<f64>>,
}

pub struct EmbeddedSolver {
    config: RtiConfig,
    integrator: ImplicitEuler,
    dims: OcpDims,
    h: f64,
    cost: LinearLsCost,
    w_sqrt: DMatrix<f64>,
    w_e_sqrt: DMatrix<f64>,
    idxbx_0: Vec<usize>,
    lbx_0: Vec<f64>,
    ubx_0: Vec<f64>,
    idxbu: Vec<usize>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    nonlinear: Option<NonlinearConstraint>,
    stages: Vec<StageData>,
    x: Vec<DVector<f64>>,
    u: Vec<DVector<f64>>,
    z: Vec<DVector<f64>>,
    freed: bool,
}

/// Symmetric square root of a positive semi-definite matrix.
fn psd_sqrt(w: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(w.clone());
    let root = eig.eigenvalues.map(|l| l.max(0.0).sqrt());
    &eig.eigenvectors * DMatrix::from_diagonal(&root) * eig.eigenvectors.transpose()
}

fn status_for(err: &CoreError) -> SolveStatus {
    match err {
        CoreError::NonFinite { .. } => SolveStatus::NanDetected,
        _ => SolveStatus::MaxIterations,
    }
}

/// Like `f64::clamp` but never panics; crossed bounds resolve to `upper`.
fn clamp_to(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}

fn within(value: f64, lower: f64, upper: f64, tol: f64) -> bool {
    value >= lower - tol * lower.abs().max(1.0) && value <= upper + tol * upper.abs().max(1.0)
}

impl EmbeddedSolver {
    pub fn new(problem: &OcpProblem, config: RtiConfig) -> SolverResult<Self> {
        let dims = *problem.dims();
        let cons = problem.constraints();
        let cost = problem.cost().clone();

        let mut stages = Vec::with_capacity(dims.stages());
        for k in 0..dims.stages() {
            let missing = |what: &str| SolverError::Create {
                what: format!("problem has no {what} for stage {k}"),
            };
            let mut stage = StageData {
                p: problem.parameters(k).ok_or_else(|| missing("parameters"))?.to_vec(),
                yref: problem.yref(k).ok_or_else(|| missing("yref"))?.to_vec(),
                ..StageData::default()
            };
            if k < dims.n {
                stage.lbu = cons.lbu.clone();
                stage.ubu = cons.ubu.clone();
                stage.lg = cons.lg.clone();
                stage.ug = cons.ug.clone();
                stage.lh = cons.lh().to_vec();
                stage.uh = cons.uh().to_vec();
            }
            stages.push(stage);
        }

        let mut x0 = DVector::zeros(dims.nx);
        for (j, &i) in cons.idxbx_0.iter().enumerate() {
            x0[i] = cons.lbx_0[j];
        }
        let integrator = ImplicitEuler::new(problem.model(), config.integrator.clone());
        let z0 = integrator
            .consistent_z(
                &x0,
                &DVector::zeros(dims.nz),
                &DVector::zeros(dims.nu),
                &to_dvector(&stages[0].p),
            )
            .map_err(|e| SolverError::Create {
                what: format!("initial algebraic state: {e}"),
            })?;

        Ok(Self {
            w_sqrt: psd_sqrt(&cost.w),
            w_e_sqrt: psd_sqrt(&cost.w_e),
            cost,
            h: problem.settings().tf_s() / dims.n as f64,
            integrator,
            idxbx_0: cons.idxbx_0.clone(),
            lbx_0: cons.lbx_0.clone(),
            ubx_0: cons.ubx_0.clone(),
            idxbu: cons.idxbu.clone(),
            c: cons.c.clone(),
            d: cons.d.clone(),
            nonlinear: cons.nonlinear.clone(),
            x: vec![x0; dims.stages()],
            u: vec![DVector::zeros(dims.nu); dims.n],
            z: vec![z0; dims.stages()],
            stages,
            dims,
            config,
            freed: false,
        })
    }

    /// `x_0` pinned by the stage-0 bounds; unpinned entries keep the iterate.
    fn initial_state(&self) -> DVector<f64> {
        let mut x0 = self.x[0].clone();
        for (j, &i) in self.idxbx_0.iter().enumerate() {
            x0[i] = clamp_to(x0[i], self.lbx_0[j], self.ubx_0[j]);
        }
        x0
    }

    fn rollout(&self, x0: &DVector<f64>, us: &[DVector<f64>]) -> CoreResult<Trajectory> {
        let n = self.dims.n;
        let mut xs = Vec::with_capacity(n + 1);
        let mut zs = Vec::with_capacity(n + 1);
        let p0 = to_dvector(&self.stages[0].p);
        zs.push(self.integrator.consistent_z(x0, &self.z[0], &us[0], &p0)?);
        xs.push(x0.clone());
        for (k, u) in us.iter().enumerate() {
            let p = to_dvector(&self.stages[k].p);
            let (x1, z1) = self.integrator.step(&xs[k], &self.z[k + 1], u, &p, self.h)?;
            xs.push(x1);
            zs.push(z1);
        }
        Ok(Trajectory {
            x: xs,
            u: us.to_vec(),
            z: zs,
        })
    }

    fn residuals(&self, traj: &Trajectory) -> DVector<f64> {
        let n = self.dims.n;
        let mut r = Vec::with_capacity(n * self.dims.ny + self.dims.ny_e);
        for k in 0..n {
            let yref = to_dvector(&self.stages[k].yref);
            let e = self.cost.stage_output(&traj.x[k], &traj.u[k], &traj.z[k]) - yref;
            r.extend((&self.w_sqrt * e).iter());
        }
        let yref_e = to_dvector(&self.stages[n].yref);
        let e = self.cost.terminal_output(&traj.x[n]) - yref_e;
        r.extend((&self.w_e_sqrt * e).iter());
        DVector::from_vec(r)
    }

    fn split(&self, flat: &DVector<f64>) -> Vec<DVector<f64>> {
        let nu = self.dims.nu;
        (0..self.dims.n)
            .map(|k| flat.rows(k * nu, nu).into_owned())
            .collect()
    }

    fn feasible(&self, stage: usize, x: &DVector<f64>, u: &DVector<f64>) -> bool {
        let tol = self.config.feasibility_tol;
        let data = &self.stages[stage];

        for (j, &i) in self.idxbu.iter().enumerate() {
            if !within(u[i], data.lbu[j], data.ubu[j], tol) {
                return false;
            }
        }
        if self.d.nrows() > 0 {
            let g = &self.c * x + &self.d * u;
            if g.iter().enumerate().any(|(j, &v)| !within(v, data.lg[j], data.ug[j], tol)) {
                return false;
            }
        }
        if let Some(con) = &self.nonlinear {
            match con.eval(x.as_slice(), u.as_slice()) {
                Ok(h) => {
                    if h.iter().enumerate().any(|(j, &v)| !within(v, data.lh[j], data.uh[j], tol)) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }

    /// Clamp box bounds, then shrink `u` towards the origin until feasible.
    fn project(&self, stage: usize, x: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>, SolveStatus> {
        let data = &self.stages[stage];
        let mut u = u.clone();
        for (j, &i) in self.idxbu.iter().enumerate() {
            u[i] = clamp_to(u[i], data.lbu[j], data.ubu[j]);
        }
        if self.feasible(stage, x, &u) {
            return Ok(u);
        }
        if !self.feasible(stage, x, &(&u * 0.0)) {
            return Err(SolveStatus::QpFailure);
        }
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..self.config.projection_iters {
            let mid = 0.5 * (lo + hi);
            if self.feasible(stage, x, &(&u * mid)) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(u * lo)
    }

    /// One projected Gauss-Newton step from the stored iterate.
    fn iterate(&self, x0: &DVector<f64>) -> Result<Trajectory, SolveStatus> {
        let nu = self.dims.nu;
        let mut flat = DVector::zeros(self.dims.n * nu);
        for (k, u) in self.u.iter().enumerate() {
            flat.rows_mut(k * nu, nu).copy_from(u);
        }

        let objective = |uf: &DVector<f64>| -> CoreResult<DVector<f64>> {
            let traj = self.rollout(x0, &self.split(uf))?;
            Ok(self.residuals(&traj))
        };

        let r0 = objective(&flat).map_err(|e| status_for(&e))?;
        let jac = finite_difference_jacobian(&flat, &objective, self.config.fd_epsilon)
            .map_err(|e| status_for(&e))?;

        let jt = jac.transpose();
        let mut hess = &jt * &jac;
        let lambda = self.config.regularization * hess.diagonal().amax().max(1.0);
        for i in 0..hess.nrows() {
            hess[(i, i)] += lambda;
        }
        let grad = &jt * &r0;
        let step = hess
            .cholesky()
            .ok_or(SolveStatus::QpFailure)?
            .solve(&(-grad));
        let candidate = self.split(&(flat + step));

        let mut x = vec![x0.clone()];
        let mut u = Vec::with_capacity(self.dims.n);
        let mut z = Vec::with_capacity(self.dims.stages());
        let p0 = to_dvector(&self.stages[0].p);
        let z0 = self
            .integrator
            .consistent_z(x0, &self.z[0], &candidate[0], &p0)
            .map_err(|e| status_for(&e))?;
        z.push(z0);
        for (k, uk) in candidate.iter().enumerate() {
            let uk = self.project(k, &x[k], uk)?;
            let p = to_dvector(&self.stages[k].p);
            let (x1, z1) = self
                .integrator
                .step(&x[k], &self.z[k + 1], &uk, &p, self.h)
                .map_err(|e| status_for(&e))?;
            x.push(x1);
            z.push(z1);
            u.push(uk);
        }

        let traj = Trajectory { x, u, z };
        debug!(cost = self.residuals(&traj).norm_squared(), cost_before = r0.norm_squared(), "RTI step");
        Ok(traj)
    }

    fn stage_data(&self, stage: usize, field: Field) -> SolverResult<&StageData> {
        self.stages
            .get(stage)
            .ok_or_else(|| SolverError::interface(field, stage, "stage out of range"))
    }

    fn stage_data_mut(&mut self, stage: usize, field: Field) -> SolverResult<&mut StageData> {
        self.stages
            .get_mut(stage)
            .ok_or_else(|| SolverError::interface(field, stage, "stage out of range"))
    }
}

fn vector_at(v: &[DVector<f64>], stage: usize, field: Field) -> SolverResult<Vec<f64>> {
    v.get(stage)
        .map(|x| x.as_slice().to_vec())
        .ok_or_else(|| SolverError::interface(field, stage, "stage out of range"))
}

fn assign_vector(
    v: &mut [DVector<f64>],
    stage: usize,
    field: Field,
    values: &[f64],
) -> SolverResult<()> {
    let target = v
        .get_mut(stage)
        .ok_or_else(|| SolverError::interface(field, stage, "stage out of range"))?;
    assign(target.as_mut_slice(), stage, field, values)
}

/// Overwrite `target` in place; its length is fixed at creation.
fn assign(target: &mut [f64], stage: usize, field: Field, values: &[f64]) -> SolverResult<()> {
    if target.len() != values.len() {
        return Err(SolverError::interface(
            field,
            stage,
            format!("expected {} values, got {}", target.len(), values.len()),
        ));
    }
    target.copy_from_slice(values);
    Ok(())
}

impl NlpSolver for EmbeddedSolver {
    fn name(&self) -> &str {
        "embedded-rti"
    }

    fn solve(&mut self) -> SolverResult<SolveStatus> {
        if self.freed {
            return Err(SolverError::AlreadyReleased);
        }
        let x0 = self.initial_state();
        let traj = match self.iterate(&x0) {
            Ok(traj) => traj,
            Err(status) => {
                warn!(status = %status, "RTI step failed");
                return Ok(status);
            }
        };
        let finite = traj
            .x
            .iter()
            .chain(&traj.u)
            .chain(&traj.z)
            .all(|v| v.iter().all(|e| e.is_finite()));
        if !finite {
            return Ok(SolveStatus::NanDetected);
        }
        self.x = traj.x;
        self.u = traj.u;
        self.z = traj.z;
        Ok(SolveStatus::Success)
    }

    fn get(&self, stage: usize, field: Field) -> SolverResult<Vec<f64>> {
        if self.freed {
            return Err(SolverError::AlreadyReleased);
        }
        let data = || self.stage_data(stage, field);
        Ok(match field {
            Field::X => vector_at(&self.x, stage, field)?,
            Field::U => vector_at(&self.u, stage, field)?,
            Field::Z => vector_at(&self.z, stage, field)?,
            Field::Lbx if stage == 0 => self.lbx_0.clone(),
            Field::Ubx if stage == 0 => self.ubx_0.clone(),
            Field::Lbx | Field::Ubx => {
                return Err(SolverError::interface(field, stage, "state bounds exist only at stage 0"));
            }
            Field::Lbu => data()?.lbu.clone(),
            Field::Ubu => data()?.ubu.clone(),
            Field::Lg => data()?.lg.clone(),
            Field::Ug => data()?.ug.clone(),
            Field::Lh => data()?.lh.clone(),
            Field::Uh => data()?.uh.clone(),
            Field::P => data()?.p.clone(),
            Field::Yref => data()?.yref.clone(),
        })
    }

    fn set(&mut self, stage: usize, field: Field, values: &[f64]) -> SolverResult<()> {
        if self.freed {
            return Err(SolverError::AlreadyReleased);
        }
        match field {
            Field::X => assign_vector(&mut self.x, stage, field, values),
            Field::U => assign_vector(&mut self.u, stage, field, values),
            Field::Z => assign_vector(&mut self.z, stage, field, values),
            Field::Lbx if stage == 0 => assign(&mut self.lbx_0, stage, field, values),
            Field::Ubx if stage == 0 => assign(&mut self.ubx_0, stage, field, values),
            Field::Lbx | Field::Ubx => Err(SolverError::interface(
                field,
                stage,
                "state bounds exist only at stage 0",
            )),
            _ => {
                let data = self.stage_data_mut(stage, field)?;
                let target = match field {
                    Field::Lbu => &mut data.lbu,
                    Field::Ubu => &mut data.ubu,
                    Field::Lg => &mut data.lg,
                    Field::Ug => &mut data.ug,
                    Field::Lh => &mut data.lh,
                    Field::Uh => &mut data.uh,
                    Field::P => &mut data.p,
                    _ => &mut data.yref,
                };
                assign(target, stage, field, values)
            }
        }
    }

    fn free(&mut self) -> SolverResult<()> {
        if self.freed {
            return Err(SolverError::AlreadyReleased);
        }
        self.freed = true;
        self.x.clear();
        self.u.clear();
        self.z.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_model::{Formulation, Hexagon};
    use rsm_ocp::{OcpSettings, assemble};

    fn solver(formulation: Formulation) -> (EmbeddedSolver, OcpProblem) {
        let problem = assemble(OcpSettings {
            formulation,
            ..OcpSettings::default()
        })
        .unwrap();
        (EmbeddedSolver::new(&problem, RtiConfig::default()).unwrap(), problem)
    }

    #[test]
    fn psd_sqrt_squares_back() {
        let w = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let r = psd_sqrt(&w);
        assert!((&r * &r - &w).norm() < 1e-12);
    }

    #[test]
    fn first_control_respects_every_limit_shape() {
        for f in Formulation::ALL {
            let (mut s, problem) = solver(f);
            assert_eq!(s.solve().unwrap(), SolveStatus::Success, "{f}");
            assert_eq!(s.get(0, Field::X).unwrap(), vec![0.0, 0.0]);

            let u = s.get(0, Field::U).unwrap();
            let u_max = problem.settings().u_max_v();
            match f {
                Formulation::Polytope => {
                    assert!(Hexagon::new(u_max).unwrap().contains([u[0], u[1]], 1e-6));
                }
                Formulation::Sphere | Formulation::ScqpSphere => {
                    let r2 = u[0] * u[0] + u[1] * u[1];
                    assert!(r2 <= u_max * u_max * (1.0 + 1e-8), "{r2}");
                }
            }
            // The reference flux is far from zero, so the first move saturates.
            assert!(u[0].hypot(u[1]) > 0.5 * u_max);
        }
    }

    #[test]
    fn initial_state_follows_stage_zero_bounds() {
        let (mut s, _) = solver(Formulation::Sphere);
        s.set(0, Field::Lbx, &[-0.2, 0.1]).unwrap();
        s.set(0, Field::Ubx, &[-0.2, 0.1]).unwrap();
        assert_eq!(s.solve().unwrap(), SolveStatus::Success);
        assert_eq!(s.get(0, Field::X).unwrap(), vec![-0.2, 0.1]);
    }

    #[test]
    fn shifted_loop_tracks_reference_flux() {
        let (mut s, problem) = solver(Formulation::Sphere);
        let target = problem.reference().state();
        for _ in 0..60 {
            assert_eq!(s.solve().unwrap(), SolveStatus::Success);
            let x1 = s.get(1, Field::X).unwrap();
            s.set(0, Field::Lbx, &x1).unwrap();
            s.set(0, Field::Ubx, &x1).unwrap();
        }
        let x = s.get(0, Field::X).unwrap();
        let err = ((x[0] - target[0]).powi(2) + (x[1] - target[1]).powi(2)).sqrt();
        assert!(err < 0.05, "flux error {err}, state {x:?}, target {target:?}");
    }

    #[test]
    fn use_after_free_is_rejected() {
        let (mut s, _) = solver(Formulation::Sphere);
        s.free().unwrap();
        assert_eq!(s.solve(), Err(SolverError::AlreadyReleased));
        assert_eq!(s.free(), Err(SolverError::AlreadyReleased));
    }
}
