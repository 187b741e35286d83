//! Linear least-squares tracking cost.
//!
//! ```text
//! Σ_k (y_k − yref)ᵀ W (y_k − yref) + (y_N − yref_e)ᵀ W_e (y_N − yref_e)
//! y_k = Vx·x_k + Vu·u_k + Vz·z_k,   y_N = Vx_e·x_N
//! ```

use crate::dims::OcpDims;
use crate::error::{FormulationError, FormulationResult, check_len, check_shape};
use nalgebra::{DMatrix, DVector};
use rsm_model::OperatingPoint;
use serde::{Deserialize, Serialize};

/// Diagonal weights before sampling-time scaling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Stage state weights (scaled by Ts).
    pub q: Vec<f64>,
    /// Stage control weights (scaled by Ts).
    pub r: Vec<f64>,
    /// Terminal state weights (unscaled).
    pub qn: Vec<f64>,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            q: vec![5e2, 5e2],
            r: vec![1e-4, 1e-4],
            qn: vec![1e-3, 1e-3],
        }
    }
}

impl CostWeights {
    fn validate(&self, dims: &OcpDims) -> FormulationResult<()> {
        check_len("weights.q", dims.nx, self.q.len())?;
        check_len("weights.r", dims.nu, self.r.len())?;
        check_len("weights.qn", dims.nx, self.qn.len())?;
        let all = self.q.iter().chain(&self.r).chain(&self.qn);
        if all.into_iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FormulationError::InvalidSetting {
                what: "cost weights must be finite and non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Cost matrices in solver layout.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearLsCost {
    pub w: DMatrix<f64>,
    pub vx: DMatrix<f64>,
    pub vu: DMatrix<f64>,
    pub vz: DMatrix<f64>,
    pub yref: DVector<f64>,
    pub w_e: DMatrix<f64>,
    pub vx_e: DMatrix<f64>,
    pub yref_e: DVector<f64>,
}

impl LinearLsCost {
    /// Track `[x; u]` towards the operating point.
    ///
    /// `stage_dt` is the shooting interval `Tf/N`; stage weights are scaled by
    /// it so the total cost does not grow with the horizon length.
    pub fn tracking(
        weights: &CostWeights,
        stage_dt: f64,
        reference: &OperatingPoint,
        dims: &OcpDims,
    ) -> FormulationResult<Self> {
        weights.validate(dims)?;
        let (nx, nu, nz, ny, ny_e) = (dims.nx, dims.nu, dims.nz, dims.ny, dims.ny_e);

        let diag: Vec<f64> = weights
            .q
            .iter()
            .chain(&weights.r)
            .map(|w| w * stage_dt)
            .collect();
        let w = DMatrix::from_diagonal(&DVector::from_vec(diag));

        let mut vx = DMatrix::zeros(ny, nx);
        vx.view_mut((0, 0), (nx, nx)).fill_with_identity();
        let mut vu = DMatrix::zeros(ny, nu);
        vu.view_mut((nx, 0), (nu, nu)).fill_with_identity();
        let vz = DMatrix::zeros(ny, nz);

        let yref = DVector::from_row_slice(&reference.stage_reference());
        check_len("yref", ny, yref.len())?;

        let w_e = DMatrix::from_diagonal(&DVector::from_row_slice(&weights.qn));
        let vx_e = DMatrix::identity(ny_e, nx);
        let yref_e = DVector::from_row_slice(&reference.terminal_reference());
        check_len("yref_e", ny_e, yref_e.len())?;

        Ok(Self {
            w,
            vx,
            vu,
            vz,
            yref,
            w_e,
            vx_e,
            yref_e,
        })
    }

    /// Check every matrix against the dimension tuple.
    pub fn validate(&self, dims: &OcpDims) -> FormulationResult<()> {
        check_shape("W", (dims.ny, dims.ny), self.w.shape())?;
        check_shape("Vx", (dims.ny, dims.nx), self.vx.shape())?;
        check_shape("Vu", (dims.ny, dims.nu), self.vu.shape())?;
        check_shape("Vz", (dims.ny, dims.nz), self.vz.shape())?;
        check_len("yref", dims.ny, self.yref.len())?;
        check_shape("W_e", (dims.ny_e, dims.ny_e), self.w_e.shape())?;
        check_shape("Vx_e", (dims.ny_e, dims.nx), self.vx_e.shape())?;
        check_len("yref_e", dims.ny_e, self.yref_e.len())
    }

    pub fn stage_output(&self, x: &DVector<f64>, u: &DVector<f64>, z: &DVector<f64>) -> DVector<f64> {
        &self.vx * x + &self.vu * u + &self.vz * z
    }

    pub fn terminal_output(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.vx_e * x
    }

    /// `(y − yref)ᵀ W (y − yref)` for one stage against `yref`.
    pub fn stage_cost(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        z: &DVector<f64>,
        yref: &DVector<f64>,
    ) -> f64 {
        let e = self.stage_output(x, u, z) - yref;
        e.dot(&(&self.w * &e))
    }

    pub fn terminal_cost(&self, x: &DVector<f64>, yref_e: &DVector<f64>) -> f64 {
        let e = self.terminal_output(x) - yref_e;
        e.dot(&(&self.w_e * &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_core::{amp, rad_per_s};
    use rsm_model::{Formulation, MachineParams, export_dae_model, steady_state_reference};

    fn setup() -> (OcpDims, OperatingPoint) {
        let params = MachineParams::default();
        let model = export_dae_model(&params);
        let dims = OcpDims::new(&model, Formulation::Sphere, 2).unwrap();
        let op = steady_state_reference(&params, amp(-10.0), amp(20.0), rad_per_s(300.0));
        (dims, op)
    }

    #[test]
    fn weights_scaled_by_stage_interval() {
        let (dims, op) = setup();
        let ts = 0.0008;
        let cost = LinearLsCost::tracking(&CostWeights::default(), ts, &op, &dims).unwrap();
        cost.validate(&dims).unwrap();
        for k in 0..2 {
            assert!((cost.w[(k, k)] - 5e2 * ts).abs() < 1e-15);
            assert!((cost.w[(k + 2, k + 2)] - 1e-4 * ts).abs() < 1e-18);
            assert_eq!(cost.w_e[(k, k)], 1e-3);
        }
        assert_eq!(cost.w[(0, 1)], 0.0);
    }

    #[test]
    fn selection_matrices_stack_state_over_control() {
        let (dims, op) = setup();
        let cost = LinearLsCost::tracking(&CostWeights::default(), 1e-3, &op, &dims).unwrap();
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let u = DVector::from_vec(vec![3.0, 4.0]);
        let z = DVector::from_vec(vec![5.0, 6.0]);
        assert_eq!(cost.stage_output(&x, &u, &z).as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cost.terminal_output(&x).as_slice(), &[1.0, 2.0]);
        assert_eq!(cost.vx_e.shape(), (2, 2));
    }

    #[test]
    fn cost_vanishes_at_reference() {
        let (dims, op) = setup();
        let cost = LinearLsCost::tracking(&CostWeights::default(), 1e-3, &op, &dims).unwrap();
        let x = DVector::from_row_slice(&op.state());
        let u = DVector::from_row_slice(&op.control());
        let z = DVector::from_row_slice(&op.currents());
        assert_eq!(cost.stage_cost(&x, &u, &z, &cost.yref), 0.0);
        assert_eq!(cost.terminal_cost(&x, &cost.yref_e), 0.0);
    }

    #[test]
    fn wrong_weight_length_rejected() {
        let (dims, op) = setup();
        let weights = CostWeights {
            q: vec![1.0],
            ..CostWeights::default()
        };
        assert!(matches!(
            LinearLsCost::tracking(&weights, 1e-3, &op, &dims),
            Err(FormulationError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn negative_weight_rejected() {
        let (dims, op) = setup();
        let weights = CostWeights {
            r: vec![-1.0, 1.0],
            ..CostWeights::default()
        };
        assert!(matches!(
            LinearLsCost::tracking(&weights, 1e-3, &op, &dims),
            Err(FormulationError::InvalidSetting { .. })
        ));
    }
}
