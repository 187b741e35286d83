//! Curve-fit flux linkage map of the machine.
//!
//! Each axis is fitted as a linear term plus a saturating arctangent that is
//! attenuated by the current of the other axis:
//!
//! ```text
//! ψ_d(i_d, i_q) = a_d·i_d + exp(b_d·i_q²)·atan(c_d·i_d)·k_d
//! ψ_q(i_d, i_q) = a_q·i_q + exp(b_q·i_d²)·atan(c_q·i_q)·k_q
//! ```
//!
//! The functions are generic over [`Scalar`] so the exact same formula is used
//! for numeric evaluation and for building the DAE expression graph.

use crate::error::ModelResult;
use nalgebra::{DMatrix, DVector};
use rsm_core::expr::{eval_all, jacobian};
use rsm_core::{
    Bindings, CoreResult, Expr, NewtonConfig, Scalar, SymbolSet, ensure_all_finite, newton_solve,
};

/// Fitted coefficients for one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisFit {
    /// Linear (leakage) slope `a`.
    pub linear: f64,
    /// Cross-saturation decay `b` (negative).
    pub cross_decay: f64,
    /// Arctangent gain `c`.
    pub atan_gain: f64,
    /// Saturation amplitude `k`.
    pub saturation: f64,
}

impl AxisFit {
    /// ψ as a function of the own-axis and cross-axis currents.
    pub fn eval<S: Scalar>(&self, i_own: S, i_cross: S) -> S {
        let attenuation = (i_cross.powi(2) * self.cross_decay).exp();
        i_own.clone() * self.linear + attenuation * (i_own * self.atan_gain).atan() * self.saturation
    }
}

/// Flux linkage map ψ = Ψ(i_d, i_q).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluxMap {
    pub d: AxisFit,
    pub q: AxisFit,
}

impl Default for FluxMap {
    /// Fit of the measured reluctance machine data.
    fn default() -> Self {
        Self {
            d: AxisFit {
                linear: -4.215858085639979e-3,
                cross_decay: -8.413493151721978e-5,
                atan_gain: 1.416834085282644e-1,
                saturation: 8.834738694115108e-1,
            },
            q: AxisFit {
                linear: 1.04488335702649e-2,
                cross_decay: -1.0 / 72.0,
                atan_gain: 1.0,
                saturation: 6.649036351062812e-2,
            },
        }
    }
}

impl FluxMap {
    pub fn psi_d<S: Scalar>(&self, i_d: S, i_q: S) -> S {
        self.d.eval(i_d, i_q)
    }

    pub fn psi_q<S: Scalar>(&self, i_d: S, i_q: S) -> S {
        self.q.eval(i_q, i_d)
    }

    /// Both flux components, `[ψ_d, ψ_q]`.
    pub fn flux<S: Scalar>(&self, i_d: S, i_q: S) -> [S; 2] {
        [
            self.psi_d(i_d.clone(), i_q.clone()),
            self.psi_q(i_d, i_q),
        ]
    }

    /// Solve Ψ(i) = ψ for the currents by Newton iteration.
    ///
    /// The Jacobian comes from differentiating the flux expression graph.
    /// `guess` should lie in the monotone region of the fit (|i_d| below
    /// roughly 38 A for the default coefficients).
    pub fn currents_from_flux(&self, psi: [f64; 2], guess: [f64; 2]) -> ModelResult<[f64; 2]> {
        ensure_all_finite(&psi, "flux target")?;

        let vars = SymbolSet::new(["i_d", "i_q"]);
        let exprs: Vec<Expr> = self
            .flux(Expr::sym("i_d"), Expr::sym("i_q"))
            .into_iter()
            .collect();
        let jac_exprs = jacobian(&exprs, &vars);

        let bind = |i: &DVector<f64>| -> CoreResult<Bindings> {
            let mut env = Bindings::new();
            env.bind(&vars, i.as_slice())?;
            Ok(env)
        };

        let residual = |i: &DVector<f64>| -> CoreResult<DVector<f64>> {
            let env = bind(i)?;
            let f = eval_all(&exprs, &env)?;
            Ok(DVector::from_vec(vec![f[0] - psi[0], f[1] - psi[1]]))
        };
        let jac = |i: &DVector<f64>| -> CoreResult<DMatrix<f64>> {
            let env = bind(i)?;
            let mut m = DMatrix::zeros(2, 2);
            for (r, row) in jac_exprs.iter().enumerate() {
                for (c, e) in row.iter().enumerate() {
                    m[(r, c)] = e.eval(&env)?;
                }
            }
            Ok(m)
        };

        let result = newton_solve(
            DVector::from_vec(guess.to_vec()),
            residual,
            jac,
            &NewtonConfig::default(),
        )?;
        Ok([result.x[0], result.x[1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flux_is_odd_in_own_axis_current() {
        let map = FluxMap::default();
        let [pd, pq] = map.flux(7.0, -3.0);
        let [pd_neg, pq_neg] = map.flux(-7.0, 3.0);
        assert!((pd + pd_neg).abs() < 1e-14);
        assert!((pq + pq_neg).abs() < 1e-14);
    }

    #[test]
    fn zero_current_gives_zero_flux() {
        let map = FluxMap::default();
        assert_eq!(map.flux(0.0, 0.0), [0.0, 0.0]);
    }

    #[test]
    fn symbolic_and_numeric_agree() {
        let map = FluxMap::default();
        let [ed, eq] = map.flux(Expr::sym("i_d"), Expr::sym("i_q"));
        let mut env = Bindings::new();
        env.set("i_d", -10.0);
        env.set("i_q", 20.0);
        let [nd, nq] = map.flux(-10.0, 20.0);
        assert_eq!(ed.eval(&env).unwrap(), nd);
        assert_eq!(eq.eval(&env).unwrap(), nq);
    }

    #[test]
    fn reference_point_values() {
        let map = FluxMap::default();
        let psi_d = map.psi_d(-10.0, 20.0);
        let psi_q = map.psi_q(-10.0, 20.0);
        let expected_d = -10.0 * -4.215858085639979e-3
            + (400.0 * -8.413493151721978e-5_f64).exp()
                * (-10.0 * 1.416834085282644e-1_f64).atan()
                * 8.834738694115108e-1;
        let expected_q = 20.0 * 1.04488335702649e-2
            + (100.0 * (-1.0 / 72.0_f64)).exp() * 20.0_f64.atan() * 6.649036351062812e-2;
        assert!((psi_d - expected_d).abs() < 1e-15);
        assert!((psi_q - expected_q).abs() < 1e-15);
    }

    #[test]
    fn inverse_recovers_currents() {
        let map = FluxMap::default();
        for &(id, iq) in &[(-10.0, 20.0), (1.484, 1.429), (5.0, -12.0), (0.0, 0.0)] {
            let psi = map.flux(id, iq);
            let [rd, rq] = map.currents_from_flux(psi, [0.0, 0.0]).unwrap();
            assert!((rd - id).abs() < 1e-6, "i_d {rd} vs {id}");
            assert!((rq - iq).abs() < 1e-6, "i_q {rq} vs {iq}");
        }
    }

    #[test]
    fn inverse_rejects_non_finite_target() {
        let map = FluxMap::default();
        assert!(map.currents_from_flux([f64::NAN, 0.0], [0.0, 0.0]).is_err());
    }

    proptest! {
        #[test]
        fn flux_is_finite(id in -1.0e6f64..1.0e6, iq in -1.0e6f64..1.0e6) {
            let [pd, pq] = FluxMap::default().flux(id, iq);
            prop_assert!(pd.is_finite());
            prop_assert!(pq.is_finite());
        }

        #[test]
        fn flux_is_continuous(id in -1.0e3f64..1.0e3, iq in -1.0e3f64..1.0e3) {
            let map = FluxMap::default();
            let h = 1e-6;
            let [pd0, pq0] = map.flux(id, iq);
            let [pd1, pq1] = map.flux(id + h, iq - h);
            prop_assert!((pd1 - pd0).abs() < 1e-6);
            prop_assert!((pq1 - pq0).abs() < 1e-6);
        }
    }
}
