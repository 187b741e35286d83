//! Feasible stator-voltage set.
//!
//! The inverter can only synthesise voltages inside a hexagon whose
//! circumscribed radius is `u_max = 2/3·u_dc`. Two representations are
//! provided:
//!
//! - a polytope: one box bound on `u_q` plus two general linear constraints
//!   `q1 ≤ ±m1·u_d + u_q ≤ −q1`, exact for the hexagon;
//! - a sphere: the disc `u_d² + u_q² ≤ u_max²` of radius `u_max`, which
//!   circumscribes the hexagon.

use crate::dae::{control_symbols, state_symbols};
use crate::error::{ModelError, ModelResult};
use nalgebra::DMatrix;
use rsm_core::expr::eval_all;
use rsm_core::units::raw;
use rsm_core::{Bindings, Expr, SymbolSet, Voltage, volt};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lower bound used for one-sided nonlinear constraints.
pub const NONLINEAR_LOWER_BOUND: f64 = -1.0e8;

/// How the voltage limit enters the optimal control problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// Hexagon as box bound + general linear constraints.
    Polytope,
    /// Smooth quadratic constraint `u_d² + u_q² ≤ u_max²`.
    #[default]
    Sphere,
    /// Sphere registered both as a nonlinear and a convex-over-nonlinear block.
    ScqpSphere,
}

impl Formulation {
    pub const ALL: [Formulation; 3] = [
        Formulation::Polytope,
        Formulation::Sphere,
        Formulation::ScqpSphere,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Formulation::Polytope => "polytope",
            Formulation::Sphere => "sphere",
            Formulation::ScqpSphere => "scqp_sphere",
        }
    }
}

impl std::fmt::Display for Formulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Formulation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formulation::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ModelError::InvalidParameter {
                what: format!("unknown formulation '{s}'"),
            })
    }
}

/// Peak phase voltage reachable from a DC link: `2/3·u_dc`.
pub fn voltage_limit_from_dc_link(udc: Voltage) -> Voltage {
    volt(2.0 / 3.0 * raw::volts(udc))
}

fn ensure_positive_radius(u_max: f64) -> ModelResult<()> {
    if u_max.is_finite() && u_max > 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter {
            what: format!("voltage limit must be positive and finite, got {u_max}"),
        })
    }
}

/// Regular hexagon with circumscribed radius `u_max`, vertices at 0°, 60°, ...
///
/// The slanted edges through `(r, 0)` and `(r·cos60°, r·sin60°)` satisfy
/// `u_q + m1·u_d = −q1`; the flat edges are `|u_q| = q2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hexagon {
    pub u_max: f64,
    pub m1: f64,
    pub q1: f64,
    pub q2: f64,
}

impl Hexagon {
    pub fn new(u_max: f64) -> ModelResult<Self> {
        ensure_positive_radius(u_max)?;
        let (x1, y1) = (u_max, 0.0);
        let (x2, y2) = (u_max * (PI / 3.0).cos(), u_max * (PI / 3.0).sin());

        let q1 = -(y2 - y1 / x1 * x2) / (1.0 - x2 / x1);
        let m1 = -(y1 + q1) / x1;
        let q2 = u_max * (PI / 3.0).sin();

        Ok(Self { u_max, m1, q1, q2 })
    }

    pub fn vertices(&self) -> [[f64; 2]; 6] {
        std::array::from_fn(|k| {
            let angle = k as f64 * PI / 3.0;
            [self.u_max * angle.cos(), self.u_max * angle.sin()]
        })
    }

    /// Constraint values `[m1·u_d + u_q, −m1·u_d + u_q, u_q]`.
    pub fn constraint_values(&self, u: [f64; 2]) -> [f64; 3] {
        [
            self.m1 * u[0] + u[1],
            -self.m1 * u[0] + u[1],
            u[1],
        ]
    }

    /// Symmetric half-widths matching [`Hexagon::constraint_values`].
    pub fn half_widths(&self) -> [f64; 3] {
        [-self.q1, -self.q1, self.q2]
    }

    pub fn contains(&self, u: [f64; 2], tol: f64) -> bool {
        self.constraint_values(u)
            .iter()
            .zip(self.half_widths())
            .all(|(v, w)| v.abs() <= w + tol)
    }
}

/// Linear representation of the hexagon in solver layout.
///
/// `d` has one row per general constraint and one column per control, so
/// constraint `k` reads `lg[k] ≤ d[k, :]·u + c[k, :]·x ≤ ug[k]`. `c` is
/// always zero: the limit acts on the input only.
#[derive(Clone, Debug, PartialEq)]
pub struct PolytopeConstraints {
    pub idxbu: Vec<usize>,
    pub lbu: Vec<f64>,
    pub ubu: Vec<f64>,
    pub d: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub lg: Vec<f64>,
    pub ug: Vec<f64>,
}

/// Build the polytope bound set for a voltage limit `u_max` and `nx` states.
pub fn general_constraints_dc(u_max: f64, nx: usize) -> ModelResult<PolytopeConstraints> {
    let hex = Hexagon::new(u_max)?;

    let d = DMatrix::from_row_slice(2, 2, &[hex.m1, 1.0, -hex.m1, 1.0]);
    let c = DMatrix::zeros(2, nx);

    Ok(PolytopeConstraints {
        idxbu: vec![1],
        lbu: vec![-hex.q2],
        ubu: vec![hex.q2],
        d,
        c,
        lg: vec![hex.q1, hex.q1],
        ug: vec![-hex.q1, -hex.q1],
    })
}

/// Smooth inequality `lh ≤ h(x, u) ≤ uh` exported as an expression graph.
#[derive(Clone, Debug, PartialEq)]
pub struct NonlinearConstraint {
    pub name: String,
    pub x: SymbolSet,
    pub u: SymbolSet,
    pub expr: Vec<Expr>,
    pub lh: Vec<f64>,
    pub uh: Vec<f64>,
}

impl NonlinearConstraint {
    /// Declared output dimension.
    pub fn nc(&self) -> usize {
        self.expr.len()
    }

    pub fn eval(&self, x: &[f64], u: &[f64]) -> ModelResult<Vec<f64>> {
        let mut env = Bindings::new();
        env.bind(&self.x, x)?;
        env.bind(&self.u, u)?;
        Ok(eval_all(&self.expr, &env)?)
    }

    /// Check bound lengths and that the expression only uses `x` and `u`.
    pub fn validate(&self) -> ModelResult<()> {
        for (what, len) in [("lh", self.lh.len()), ("uh", self.uh.len())] {
            if len != self.nc() {
                return Err(ModelError::ShapeMismatch {
                    what: format!("constraint '{}' {what}", self.name),
                    expected: self.nc(),
                    actual: len,
                });
            }
        }
        for e in &self.expr {
            for name in e.free_symbols() {
                if !self.x.contains(&name) && !self.u.contains(&name) {
                    return Err(ModelError::UndeclaredSymbol {
                        name,
                        context: format!("constraint '{}'", self.name),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Voltage sphere `u_d² + u_q² ≤ u_max²`.
pub fn voltage_sphere_constraint(u_max: f64) -> ModelResult<NonlinearConstraint> {
    ensure_positive_radius(u_max)?;
    let u = control_symbols();
    let v = u.exprs();
    let expr = v[0].clone().powi(2) + v[1].clone().powi(2);

    Ok(NonlinearConstraint {
        name: "v_sphere".to_string(),
        x: state_symbols(),
        u,
        expr: vec![expr],
        lh: vec![NONLINEAR_LOWER_BOUND],
        uh: vec![u_max * u_max],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADII: [f64; 3] = [1.0, 100.0, 580.0 * 2.0 / 3.0];

    #[test]
    fn hexagon_coefficients() {
        let hex = Hexagon::new(1.0).unwrap();
        assert!((hex.m1 - 3f64.sqrt()).abs() < 1e-12);
        assert!((hex.q1 + 3f64.sqrt()).abs() < 1e-12);
        assert!((hex.q2 - 3f64.sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn vertices_lie_on_two_active_constraints() {
        for r in RADII {
            let hex = Hexagon::new(r).unwrap();
            let tol = 1e-9 * r;
            for v in hex.vertices() {
                assert!(hex.contains(v, tol), "vertex {v:?} outside for r={r}");
                let active = hex
                    .constraint_values(v)
                    .iter()
                    .zip(hex.half_widths())
                    .filter(|(val, w)| (val.abs() - w).abs() <= tol)
                    .count();
                assert_eq!(active, 2, "vertex {v:?} for r={r}");
            }
        }
    }

    #[test]
    fn edge_midpoints_are_inside_and_outside_points_rejected() {
        for r in RADII {
            let hex = Hexagon::new(r).unwrap();
            let v = hex.vertices();
            for k in 0..6 {
                let a = v[k];
                let b = v[(k + 1) % 6];
                let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
                assert!(hex.contains(mid, 1e-9 * r));
                let out = [mid[0] * 1.01, mid[1] * 1.01];
                assert!(!hex.contains(out, 1e-9 * r));
            }
        }
    }

    #[test]
    fn polytope_arrays_match_hexagon() {
        for r in RADII {
            let hex = Hexagon::new(r).unwrap();
            let pc = general_constraints_dc(r, 2).unwrap();
            assert_eq!(pc.idxbu, vec![1]);
            assert_eq!(pc.d.shape(), (2, 2));
            assert_eq!(pc.c.shape(), (2, 2));
            assert!(pc.c.iter().all(|&v| v == 0.0));
            for v in hex.vertices() {
                let g = &pc.d * nalgebra::DVector::from_row_slice(&v);
                for k in 0..2 {
                    assert!(g[k] >= pc.lg[k] - 1e-9 * r && g[k] <= pc.ug[k] + 1e-9 * r);
                }
                assert!(v[1] >= pc.lbu[0] - 1e-9 * r && v[1] <= pc.ubu[0] + 1e-9 * r);
            }
        }
    }

    #[test]
    fn sphere_boundary_interior_exterior() {
        for r in RADII {
            let con = voltage_sphere_constraint(r).unwrap();
            con.validate().unwrap();
            assert_eq!(con.nc(), 1);
            let uh = con.uh[0];
            for k in 0..12 {
                let a = k as f64 * PI / 6.0 + 0.1;
                let on = [r * a.cos(), r * a.sin()];
                let h = con.eval(&[0.0, 0.0], &on).unwrap()[0];
                assert!((h - uh).abs() <= 1e-12 * uh, "on-boundary {h} vs {uh}");

                let inside = [0.5 * on[0], 0.5 * on[1]];
                assert!(con.eval(&[0.0, 0.0], &inside).unwrap()[0] < uh);

                let outside = [1.5 * on[0], 1.5 * on[1]];
                assert!(con.eval(&[0.0, 0.0], &outside).unwrap()[0] > uh);
            }
        }
    }

    #[test]
    fn non_positive_radius_rejected() {
        assert!(Hexagon::new(0.0).is_err());
        assert!(voltage_sphere_constraint(-1.0).is_err());
        assert!(general_constraints_dc(f64::NAN, 2).is_err());
    }

    #[test]
    fn dc_link_scaling() {
        let u = voltage_limit_from_dc_link(volt(580.0));
        assert!((raw::volts(u) - 386.666_666_666_666_7).abs() < 1e-9);
    }

    #[test]
    fn formulation_names_roundtrip() {
        for f in Formulation::ALL {
            assert_eq!(f.as_str().parse::<Formulation>().unwrap(), f);
        }
        assert!("hexagon".parse::<Formulation>().is_err());
    }
}
