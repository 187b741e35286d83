//! Finite difference Jacobian computation.

use crate::error::CoreResult;
use nalgebra::{DMatrix, DVector};

/// Compute Jacobian using forward finite differences.
///
/// For each column j, perturbs x[j] by epsilon and computes (f(x+e) - f(x))/epsilon.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> CoreResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
{
    let n = x.len();
    let f_x = f(x)?;
    let m = f_x.len();

    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let mut x_perturbed = x.clone();
        let dx = epsilon * x[j].abs().max(1.0);
        x_perturbed[j] += dx;

        let f_perturbed = f(&x_perturbed)?;
        let df = (f_perturbed - &f_x) / dx;

        jac.set_column(j, &df);
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_term_of_voltage_equation() {
        // u = Rs·i + w·J·psi with i held fixed: d/dpsi is w·J.
        let w = 300.0;
        let f = |psi: &DVector<f64>| -> CoreResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![0.4 * -10.0 - w * psi[1], 0.4 * 20.0 + w * psi[0]]))
        };
        let psi = DVector::from_vec(vec![0.08, 0.15]);
        let jac = finite_difference_jacobian(&psi, f, 1e-7).unwrap();

        assert!(jac[(0, 0)].abs() < 1e-4);
        assert!((jac[(0, 1)] + w).abs() < 1e-4);
        assert!((jac[(1, 0)] - w).abs() < 1e-4);
        assert!(jac[(1, 1)].abs() < 1e-4);
    }

    #[test]
    fn step_scales_with_magnitude() {
        // Quadratic constraint u_d² + u_q² at a voltage-sized point.
        let f = |u: &DVector<f64>| -> CoreResult<DVector<f64>> {
            Ok(DVector::from_element(1, u[0] * u[0] + u[1] * u[1]))
        };
        let u = DVector::from_vec(vec![250.0, -120.0]);
        let jac = finite_difference_jacobian(&u, f, 1e-8).unwrap();

        assert!((jac[(0, 0)] - 500.0).abs() < 1e-3);
        assert!((jac[(0, 1)] + 240.0).abs() < 1e-3);
    }

    #[test]
    fn propagates_evaluation_errors() {
        let f = |_: &DVector<f64>| -> CoreResult<DVector<f64>> {
            Err(crate::CoreError::Invariant { what: "rollout" })
        };
        assert!(finite_difference_jacobian(&DVector::zeros(2), f, 1e-6).is_err());
    }
}
