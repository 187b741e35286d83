//! Validated, immutable problem description.

use crate::constraints::ConstraintSet;
use crate::cost::{CostWeights, LinearLsCost};
use crate::dims::OcpDims;
use crate::error::{FormulationError, FormulationResult, check_len};
use rsm_core::units::raw;
use rsm_core::{AngularVelocity, Current, Time, Voltage, amp, ensure_finite, rad_per_s, s, volt};
use rsm_model::{
    DaeModel, Formulation, MachineParams, OperatingPoint, export_dae_model, steady_state_reference,
    voltage_limit_from_dc_link,
};
use serde::Serialize;
use tracing::info;

/// Scenario inputs fixed at session start.
#[derive(Clone, Debug)]
pub struct OcpSettings {
    pub machine: MachineParams,
    pub i_d_ref: Current,
    pub i_q_ref: Current,
    pub speed: AngularVelocity,
    /// Additive voltage disturbances `[d_d, d_q]` in V.
    pub disturbance: [f64; 2],
    /// Circumscribed radius of the voltage hexagon.
    pub u_max: Voltage,
    /// Shooting interval.
    pub ts: Time,
    /// Number of shooting intervals.
    pub n: usize,
    pub formulation: Formulation,
    pub weights: CostWeights,
}

impl Default for OcpSettings {
    fn default() -> Self {
        Self {
            machine: MachineParams::default(),
            i_d_ref: amp(-10.0),
            i_q_ref: amp(20.0),
            speed: rad_per_s(300.0),
            disturbance: [0.0, 0.0],
            u_max: voltage_limit_from_dc_link(volt(580.0)),
            ts: s(0.0008),
            n: 2,
            formulation: Formulation::default(),
            weights: CostWeights::default(),
        }
    }
}

impl OcpSettings {
    pub fn ts_s(&self) -> f64 {
        raw::seconds(self.ts)
    }

    pub fn u_max_v(&self) -> f64 {
        raw::volts(self.u_max)
    }

    /// Prediction horizon length `Tf = N·Ts`.
    pub fn tf_s(&self) -> f64 {
        self.ts_s() * self.n as f64
    }

    fn validate(&self) -> FormulationResult<()> {
        let positive = [("Ts", self.ts_s()), ("u_max", self.u_max_v())];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(FormulationError::InvalidSetting {
                    what: format!("{name} must be positive and finite, got {v}"),
                });
            }
        }
        if self.n == 0 {
            return Err(FormulationError::InvalidSetting {
                what: "horizon N must be at least 1".to_string(),
            });
        }
        let finite = [
            ("i_d_ref", raw::amps(self.i_d_ref)),
            ("i_q_ref", raw::amps(self.i_q_ref)),
            ("speed", raw::rad_s(self.speed)),
            ("dist_d", self.disturbance[0]),
            ("dist_q", self.disturbance[1]),
        ];
        for (name, v) in finite {
            ensure_finite(v, name)?;
        }
        Ok(())
    }
}

/// Single validated construction step for [`OcpProblem`].
///
/// Every block defaults to what the settings imply; the setters replace a
/// block wholesale and `build` checks the result for consistency.
#[derive(Clone, Debug)]
pub struct OcpBuilder {
    settings: OcpSettings,
    model: Option<DaeModel>,
    cost: Option<LinearLsCost>,
    constraints: Option<ConstraintSet>,
    parameters: Option<Vec<f64>>,
}

impl OcpBuilder {
    pub fn new(settings: OcpSettings) -> Self {
        Self {
            settings,
            model: None,
            cost: None,
            constraints: None,
            parameters: None,
        }
    }

    pub fn model(mut self, model: DaeModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn cost(mut self, cost: LinearLsCost) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Stage parameter vector broadcast to every stage.
    pub fn parameters(mut self, p: Vec<f64>) -> Self {
        self.parameters = Some(p);
        self
    }

    pub fn build(self) -> FormulationResult<OcpProblem> {
        let settings = self.settings;
        settings.validate()?;

        let model = match self.model {
            Some(m) => m,
            None => export_dae_model(&settings.machine),
        };
        model.validate()?;

        let dims = OcpDims::new(&model, settings.formulation, settings.n)?;
        let reference = steady_state_reference(
            &settings.machine,
            settings.i_d_ref,
            settings.i_q_ref,
            settings.speed,
        );
        let stage_dt = settings.tf_s() / settings.n as f64;

        let cost = match self.cost {
            Some(c) => c,
            None => LinearLsCost::tracking(&settings.weights, stage_dt, &reference, &dims)?,
        };
        cost.validate(&dims)?;

        let constraints = match self.constraints {
            Some(c) => c,
            None => ConstraintSet::for_formulation(
                settings.formulation,
                settings.u_max_v(),
                dims.nx,
                dims.nu,
            )?,
        };
        constraints.validate(&dims, &model)?;

        let p = self.parameters.unwrap_or_else(|| {
            vec![
                raw::rad_s(settings.speed),
                settings.disturbance[0],
                settings.disturbance[1],
            ]
        });
        check_len("parameter vector", dims.np, p.len())?;
        let parameters = vec![p; dims.stages()];

        info!(
            formulation = %settings.formulation,
            n = dims.n,
            ts = settings.ts_s(),
            ny = dims.ny,
            nh = dims.nh(),
            ng = dims.ng(),
            "Assembled OCP '{}'",
            model.name
        );

        Ok(OcpProblem {
            settings,
            model,
            dims,
            reference,
            cost,
            constraints,
            parameters,
        })
    }
}

/// Build the problem implied by `settings`.
pub fn assemble(settings: OcpSettings) -> FormulationResult<OcpProblem> {
    OcpBuilder::new(settings).build()
}

/// Read-only problem description handed to a solver backend.
#[derive(Clone, Debug)]
pub struct OcpProblem {
    settings: OcpSettings,
    model: DaeModel,
    dims: OcpDims,
    reference: OperatingPoint,
    cost: LinearLsCost,
    constraints: ConstraintSet,
    parameters: Vec<Vec<f64>>,
}

impl OcpProblem {
    pub fn settings(&self) -> &OcpSettings {
        &self.settings
    }

    pub fn model(&self) -> &DaeModel {
        &self.model
    }

    pub fn dims(&self) -> &OcpDims {
        &self.dims
    }

    pub fn reference(&self) -> &OperatingPoint {
        &self.reference
    }

    pub fn cost(&self) -> &LinearLsCost {
        &self.cost
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn formulation(&self) -> Formulation {
        self.settings.formulation
    }

    pub fn n(&self) -> usize {
        self.dims.n
    }

    pub fn ts(&self) -> f64 {
        self.settings.ts_s()
    }

    /// Parameter vector at `stage`, `None` past the terminal stage.
    pub fn parameters(&self, stage: usize) -> Option<&[f64]> {
        self.parameters.get(stage).map(Vec::as_slice)
    }

    /// Tracking target at `stage`: `yref` before the terminal stage, `yref_e` at it.
    pub fn yref(&self, stage: usize) -> Option<&[f64]> {
        if stage < self.dims.n {
            Some(self.cost.yref.as_slice())
        } else if stage == self.dims.n {
            Some(self.cost.yref_e.as_slice())
        } else {
            None
        }
    }

    pub fn summary(&self) -> OcpSummary {
        let c = &self.constraints;
        let mut nonlinear = Vec::new();
        for block in [&c.nonlinear, &c.convex_part].into_iter().flatten() {
            nonlinear.push(NonlinearSummary {
                name: block.name.clone(),
                expr: block.expr.iter().map(ToString::to_string).collect(),
                lh: block.lh.clone(),
                uh: block.uh.clone(),
            });
        }
        OcpSummary {
            model: self.model.name.clone(),
            formulation: self.formulation(),
            n: self.dims.n,
            ts: self.ts(),
            tf: self.settings.tf_s(),
            u_max: self.settings.u_max_v(),
            dims: self.dims,
            residual: self.model.f_impl.iter().map(ToString::to_string).collect(),
            yref: self.cost.yref.as_slice().to_vec(),
            yref_e: self.cost.yref_e.as_slice().to_vec(),
            w_diag: self.cost.w.diagonal().as_slice().to_vec(),
            w_e_diag: self.cost.w_e.diagonal().as_slice().to_vec(),
            idxbx_0: c.idxbx_0.clone(),
            idxbu: c.idxbu.clone(),
            lbu: c.lbu.clone(),
            ubu: c.ubu.clone(),
            d_col_major: c.d.as_slice().to_vec(),
            c_col_major: c.c.as_slice().to_vec(),
            lg: c.lg.clone(),
            ug: c.ug.clone(),
            nonlinear,
            parameters: self.parameters.first().cloned().unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NonlinearSummary {
    pub name: String,
    pub expr: Vec<String>,
    pub lh: Vec<f64>,
    pub uh: Vec<f64>,
}

/// Serializable digest of an assembled problem.
#[derive(Clone, Debug, Serialize)]
pub struct OcpSummary {
    pub model: String,
    pub formulation: Formulation,
    pub n: usize,
    pub ts: f64,
    pub tf: f64,
    pub u_max: f64,
    pub dims: OcpDims,
    pub residual: Vec<String>,
    pub yref: Vec<f64>,
    pub yref_e: Vec<f64>,
    pub w_diag: Vec<f64>,
    pub w_e_diag: Vec<f64>,
    pub idxbx_0: Vec<usize>,
    pub idxbu: Vec<usize>,
    pub lbu: Vec<f64>,
    pub ubu: Vec<f64>,
    pub d_col_major: Vec<f64>,
    pub c_col_major: Vec<f64>,
    pub lg: Vec<f64>,
    pub ug: Vec<f64>,
    pub nonlinear: Vec<NonlinearSummary>,
    pub parameters: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_assemble() {
        let problem = assemble(OcpSettings::default()).unwrap();
        assert_eq!(problem.formulation(), Formulation::Sphere);
        assert_eq!(problem.n(), 2);
        assert!((problem.ts() - 0.0008).abs() < 1e-15);
        assert!((problem.settings().u_max_v() - 580.0 * 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn parameters_broadcast_to_every_stage() {
        let settings = OcpSettings {
            disturbance: [1.0, -2.0],
            ..OcpSettings::default()
        };
        let problem = assemble(settings).unwrap();
        for k in 0..=problem.n() {
            assert_eq!(problem.parameters(k).unwrap(), &[300.0, 1.0, -2.0]);
        }
        assert!(problem.parameters(problem.n() + 1).is_none());
    }

    #[test]
    fn yref_switches_to_terminal_at_last_stage() {
        let problem = assemble(OcpSettings::default()).unwrap();
        assert_eq!(problem.yref(0).unwrap().len(), 4);
        assert_eq!(problem.yref(1).unwrap().len(), 4);
        assert_eq!(problem.yref(2).unwrap().len(), 2);
        assert!(problem.yref(3).is_none());
    }

    #[test]
    fn non_positive_sampling_time_rejected() {
        let settings = OcpSettings {
            ts: s(0.0),
            ..OcpSettings::default()
        };
        assert!(matches!(
            assemble(settings),
            Err(FormulationError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn wrong_parameter_length_rejected() {
        let err = OcpBuilder::new(OcpSettings::default())
            .parameters(vec![300.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            FormulationError::DimensionMismatch {
                what: "parameter vector".to_string(),
                expected: 3,
                actual: 1,
            }
        );
    }

    #[test]
    fn summary_flattens_d_column_major() {
        let settings = OcpSettings {
            formulation: Formulation::Polytope,
            ..OcpSettings::default()
        };
        let summary = assemble(settings).unwrap().summary();
        let m1 = 3f64.sqrt();
        assert_eq!(summary.d_col_major.len(), 4);
        assert!((summary.d_col_major[0] - m1).abs() < 1e-12);
        assert!((summary.d_col_major[1] + m1).abs() < 1e-12);
        assert_eq!(&summary.d_col_major[2..], &[1.0, 1.0]);
        assert!(summary.nonlinear.is_empty());
    }
}
