//! Implicit Euler integration of the DAE residual.
//!
//! One step solves `F((x⁺ − x)/h, x⁺, z⁺, u, p) = 0` for `(x⁺, z⁺)` with
//! Newton iterations. Jacobians come from differentiating the residual
//! expression graph once, at construction.

use nalgebra::{DMatrix, DVector};
use rsm_core::expr::{eval_all, jacobian};
use rsm_core::{Bindings, CoreResult, Expr, NewtonConfig, newton_solve};
use rsm_model::DaeModel;

/// Integrator for one shooting interval.
#[derive(Clone, Debug)]
pub struct ImplicitEuler {
    model: DaeModel,
    jac_xdot: Vec<Vec<Expr>>,
    jac_x: Vec<Vec<Expr>>,
    jac_z: Vec<Vec<Expr>>,
    newton: NewtonConfig,
}

fn eval_matrix(rows: &[Vec<Expr>], env: &Bindings) -> CoreResult<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    let mut m = DMatrix::zeros(rows.len(), ncols);
    for (r, row) in rows.iter().enumerate() {
        for (c, e) in row.iter().enumerate() {
            m[(r, c)] = e.eval(env)?;
        }
    }
    Ok(m)
}

impl ImplicitEuler {
    pub fn new(model: &DaeModel, newton: NewtonConfig) -> Self {
        Self {
            jac_xdot: jacobian(&model.f_impl, &model.xdot),
            jac_x: jacobian(&model.f_impl, &model.x),
            jac_z: jacobian(&model.f_impl, &model.z),
            model: model.clone(),
            newton,
        }
    }

    fn bind(&self, xdot: &[f64], x: &[f64], z: &[f64], u: &[f64], p: &[f64]) -> CoreResult<Bindings> {
        let mut env = Bindings::new();
        env.bind(&self.model.xdot, xdot)?;
        env.bind(&self.model.x, x)?;
        env.bind(&self.model.z, z)?;
        env.bind(&self.model.u, u)?;
        env.bind(&self.model.p, p)?;
        Ok(env)
    }

    /// Advance `x` by `h`; returns `(x⁺, z⁺)`.
    pub fn step(
        &self,
        x: &DVector<f64>,
        z_guess: &DVector<f64>,
        u: &DVector<f64>,
        p: &DVector<f64>,
        h: f64,
    ) -> CoreResult<(DVector<f64>, DVector<f64>)> {
        let nx = self.model.nx();
        let nz = self.model.nz();

        let split = |w: &DVector<f64>| -> (Vec<f64>, Vec<f64>) {
            let x1 = &w.as_slice()[..nx];
            let xdot = x1.iter().zip(x.iter()).map(|(a, b)| (a - b) / h).collect();
            (x1.to_vec(), xdot)
        };

        let residual = |w: &DVector<f64>| -> CoreResult<DVector<f64>> {
            let (x1, xdot) = split(w);
            let z1 = &w.as_slice()[nx..];
            let env = self.bind(&xdot, &x1, z1, u.as_slice(), p.as_slice())?;
            Ok(DVector::from_vec(eval_all(&self.model.f_impl, &env)?))
        };

        let jac = |w: &DVector<f64>| -> CoreResult<DMatrix<f64>> {
            let (x1, xdot) = split(w);
            let z1 = &w.as_slice()[nx..];
            let env = self.bind(&xdot, &x1, z1, u.as_slice(), p.as_slice())?;
            let dx = eval_matrix(&self.jac_xdot, &env)? / h + eval_matrix(&self.jac_x, &env)?;
            let dz = eval_matrix(&self.jac_z, &env)?;
            let mut m = DMatrix::zeros(nx + nz, nx + nz);
            m.view_mut((0, 0), (nx + nz, nx)).copy_from(&dx);
            m.view_mut((0, nx), (nx + nz, nz)).copy_from(&dz);
            Ok(m)
        };

        let mut w0 = DVector::zeros(nx + nz);
        w0.rows_mut(0, nx).copy_from(x);
        w0.rows_mut(nx, nz).copy_from(z_guess);

        let result = newton_solve(w0, residual, jac, &self.newton)?;
        let x1 = result.x.rows(0, nx).into_owned();
        let z1 = result.x.rows(nx, nz).into_owned();
        Ok((x1, z1))
    }

    /// Algebraic variables consistent with `x`: solves the closure rows for `z`.
    pub fn consistent_z(
        &self,
        x: &DVector<f64>,
        z_guess: &DVector<f64>,
        u: &DVector<f64>,
        p: &DVector<f64>,
    ) -> CoreResult<DVector<f64>> {
        let nx = self.model.nx();
        let nz = self.model.nz();
        let xdot = vec![0.0; nx];
        let rows = &self.model.f_impl[nx..];
        let jac_rows = &self.jac_z[nx..];

        let residual = |z: &DVector<f64>| -> CoreResult<DVector<f64>> {
            let env = self.bind(&xdot, x.as_slice(), z.as_slice(), u.as_slice(), p.as_slice())?;
            Ok(DVector::from_vec(eval_all(rows, &env)?))
        };
        let jac = |z: &DVector<f64>| -> CoreResult<DMatrix<f64>> {
            let env = self.bind(&xdot, x.as_slice(), z.as_slice(), u.as_slice(), p.as_slice())?;
            eval_matrix(jac_rows, &env)
        };

        debug_assert_eq!(z_guess.len(), nz);
        Ok(newton_solve(z_guess.clone(), residual, jac, &self.newton)?.x)
    }
}
