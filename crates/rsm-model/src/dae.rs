//! Implicit DAE model of the machine in the rotor (dq) frame.
//!
//! States are the flux linkages, controls the stator voltages, algebraic
//! variables the stator currents and parameters the rotor speed plus two
//! additive voltage disturbances:
//!
//! ```text
//! ψ̇ − u + Rs·i + ω·J·ψ − d = 0      (flux dynamics, J = [[0, −1], [1, 0]])
//! ψ − Ψ(i)               = 0      (flux map closure)
//! ```
//!
//! Only the implicit form is exported, so the solver has to use an implicit
//! integrator.

use crate::error::{ModelError, ModelResult};
use crate::flux::FluxMap;
use rsm_core::expr::eval_all;
use rsm_core::units::raw;
use rsm_core::{Bindings, Expr, Resistance, SymbolSet, ohm};
use std::collections::BTreeSet;

/// Name used to bind the generated code of this model.
pub const MODEL_NAME: &str = "rsm";

/// Cross-coupling rotation applied to the flux vector.
pub const CROSS_COUPLING: [[f64; 2]; 2] = [[0.0, -1.0], [1.0, 0.0]];

/// Fixed machine constants.
#[derive(Clone, Copy, Debug)]
pub struct MachineParams {
    /// Stator resistance.
    pub rs: Resistance,
    /// Flux linkage fit.
    pub flux_map: FluxMap,
}

impl Default for MachineParams {
    fn default() -> Self {
        Self {
            rs: ohm(0.4),
            flux_map: FluxMap::default(),
        }
    }
}

impl MachineParams {
    pub fn rs_ohm(&self) -> f64 {
        raw::ohms(self.rs)
    }
}

pub fn state_symbols() -> SymbolSet {
    SymbolSet::new(["psi_d", "psi_q"])
}

pub fn state_derivative_symbols() -> SymbolSet {
    SymbolSet::new(["psi_d_dot", "psi_q_dot"])
}

pub fn control_symbols() -> SymbolSet {
    SymbolSet::new(["u_d", "u_q"])
}

pub fn algebraic_symbols() -> SymbolSet {
    SymbolSet::new(["i_d", "i_q"])
}

pub fn parameter_symbols() -> SymbolSet {
    SymbolSet::new(["w", "dist_d", "dist_q"])
}

/// Exported model: symbol sets plus the implicit residual expressions.
#[derive(Clone, Debug)]
pub struct DaeModel {
    pub name: String,
    pub x: SymbolSet,
    pub xdot: SymbolSet,
    pub u: SymbolSet,
    pub z: SymbolSet,
    pub p: SymbolSet,
    /// Residual `F(xdot, x, z, u, p)`, length `nx + nz`.
    pub f_impl: Vec<Expr>,
}

/// Build the machine DAE.
pub fn export_dae_model(params: &MachineParams) -> DaeModel {
    let x = state_symbols();
    let xdot = state_derivative_symbols();
    let u = control_symbols();
    let z = algebraic_symbols();
    let p = parameter_symbols();

    let psi = x.exprs();
    let psi_dot = xdot.exprs();
    let volt = u.exprs();
    let cur = z.exprs();
    let par = p.exprs();
    let w = par[0].clone();
    let dist = [par[1].clone(), par[2].clone()];
    let rs = params.rs_ohm();

    let flux = params.flux_map.flux(cur[0].clone(), cur[1].clone());

    let mut f_impl = Vec::with_capacity(4);
    for axis in 0..2 {
        let coupling = (0..2).fold(Expr::zero(), |acc, j| {
            acc + CROSS_COUPLING[axis][j] * psi[j].clone()
        });
        f_impl.push(
            psi_dot[axis].clone() - volt[axis].clone() + rs * cur[axis].clone()
                + w.clone() * coupling
                - dist[axis].clone(),
        );
    }
    for (axis, psi_fit) in flux.into_iter().enumerate() {
        f_impl.push(psi[axis].clone() - psi_fit);
    }

    DaeModel {
        name: MODEL_NAME.to_string(),
        x,
        xdot,
        u,
        z,
        p,
        f_impl,
    }
}

impl DaeModel {
    pub fn nx(&self) -> usize {
        self.x.len()
    }

    pub fn nu(&self) -> usize {
        self.u.len()
    }

    pub fn nz(&self) -> usize {
        self.z.len()
    }

    pub fn np(&self) -> usize {
        self.p.len()
    }

    /// All symbols the residual may reference.
    pub fn declared_symbols(&self) -> BTreeSet<String> {
        [&self.x, &self.xdot, &self.u, &self.z, &self.p]
            .iter()
            .flat_map(|set| set.names().iter().cloned())
            .collect()
    }

    /// Check residual length and that every referenced symbol is declared.
    pub fn validate(&self) -> ModelResult<()> {
        if self.xdot.len() != self.x.len() {
            return Err(ModelError::ShapeMismatch {
                what: "xdot symbols".to_string(),
                expected: self.x.len(),
                actual: self.xdot.len(),
            });
        }
        if self.f_impl.len() != self.nx() + self.nz() {
            return Err(ModelError::ShapeMismatch {
                what: "implicit residual".to_string(),
                expected: self.nx() + self.nz(),
                actual: self.f_impl.len(),
            });
        }
        let declared = self.declared_symbols();
        for expr in &self.f_impl {
            if let Some(name) = expr.free_symbols().difference(&declared).next() {
                return Err(ModelError::UndeclaredSymbol {
                    name: name.clone(),
                    context: format!("model '{}' residual", self.name),
                });
            }
        }
        Ok(())
    }

    /// Bind numeric values to every model symbol.
    pub fn bindings(
        &self,
        xdot: &[f64],
        x: &[f64],
        z: &[f64],
        u: &[f64],
        p: &[f64],
    ) -> ModelResult<Bindings> {
        let mut env = Bindings::new();
        env.bind(&self.xdot, xdot)?;
        env.bind(&self.x, x)?;
        env.bind(&self.z, z)?;
        env.bind(&self.u, u)?;
        env.bind(&self.p, p)?;
        Ok(env)
    }

    /// Evaluate the residual numerically.
    pub fn residual(
        &self,
        xdot: &[f64],
        x: &[f64],
        z: &[f64],
        u: &[f64],
        p: &[f64],
    ) -> ModelResult<Vec<f64>> {
        let env = self.bindings(xdot, x, z, u, p)?;
        Ok(eval_all(&self.f_impl, &env)?)
    }
}
