//! Problem dimensions and the per-formulation constraint count table.

use crate::error::{FormulationError, FormulationResult};
use rsm_model::{DaeModel, Formulation};
use serde::Serialize;

/// Constraint counts enabled by a formulation mode.
///
/// Each mode switches on exactly the bound and constraint classes it needs
/// and leaves the others at zero. Terminal counts are zero in every mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ModeDims {
    /// Bounded controls per stage.
    pub nbu: usize,
    /// General linear constraints per stage.
    pub ng: usize,
    /// Nonlinear constraints per stage.
    pub nh: usize,
    /// Convex-over-nonlinear constraints per stage.
    pub npd: usize,
    pub nh_e: usize,
    pub ng_e: usize,
    pub nbx_e: usize,
}

impl ModeDims {
    pub const fn for_formulation(formulation: Formulation) -> Self {
        let (nbu, ng, nh, npd) = match formulation {
            Formulation::Polytope => (1, 2, 0, 0),
            Formulation::Sphere => (0, 0, 1, 0),
            Formulation::ScqpSphere => (0, 0, 1, 1),
        };
        Self {
            nbu,
            ng,
            nh,
            npd,
            nh_e: 0,
            ng_e: 0,
            nbx_e: 0,
        }
    }
}

/// Full dimension tuple of the assembled problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OcpDims {
    pub nx: usize,
    pub nu: usize,
    pub nz: usize,
    pub np: usize,
    /// Stage output size, `nx + nu`.
    pub ny: usize,
    /// Terminal output size, `nx`.
    pub ny_e: usize,
    /// Bounded states at stage 0.
    pub nbx_0: usize,
    pub mode: ModeDims,
    /// Number of shooting intervals.
    pub n: usize,
}

impl OcpDims {
    pub fn new(model: &DaeModel, formulation: Formulation, n: usize) -> FormulationResult<Self> {
        if n == 0 {
            return Err(FormulationError::InvalidSetting {
                what: "horizon N must be at least 1".to_string(),
            });
        }
        let nx = model.nx();
        let nu = model.nu();
        Ok(Self {
            nx,
            nu,
            nz: model.nz(),
            np: model.np(),
            ny: nx + nu,
            ny_e: nx,
            nbx_0: nx,
            mode: ModeDims::for_formulation(formulation),
            n,
        })
    }

    pub fn nbu(&self) -> usize {
        self.mode.nbu
    }

    pub fn ng(&self) -> usize {
        self.mode.ng
    }

    pub fn nh(&self) -> usize {
        self.mode.nh
    }

    pub fn npd(&self) -> usize {
        self.mode.npd
    }

    /// Number of stages carrying a state, `N + 1`.
    pub fn stages(&self) -> usize {
        self.n + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_model::{MachineParams, export_dae_model};

    #[test]
    fn mode_table() {
        let rows = [
            (Formulation::Polytope, (1, 2, 0, 0)),
            (Formulation::Sphere, (0, 0, 1, 0)),
            (Formulation::ScqpSphere, (0, 0, 1, 1)),
        ];
        for (f, (nbu, ng, nh, npd)) in rows {
            let m = ModeDims::for_formulation(f);
            assert_eq!((m.nbu, m.ng, m.nh, m.npd), (nbu, ng, nh, npd), "{f}");
            assert_eq!((m.nh_e, m.ng_e, m.nbx_e), (0, 0, 0));
        }
    }

    #[test]
    fn output_sizes_follow_model() {
        let model = export_dae_model(&MachineParams::default());
        let dims = OcpDims::new(&model, Formulation::Sphere, 2).unwrap();
        assert_eq!(dims.ny, 4);
        assert_eq!(dims.ny_e, 2);
        assert_eq!(dims.nbx_0, 2);
        assert_eq!(dims.stages(), 3);
    }

    #[test]
    fn zero_horizon_rejected() {
        let model = export_dae_model(&MachineParams::default());
        assert!(matches!(
            OcpDims::new(&model, Formulation::Sphere, 0),
            Err(FormulationError::InvalidSetting { .. })
        ));
    }
}
