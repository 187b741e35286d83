use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Check every entry of a slice, reporting the first non-finite value.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> Result<(), CoreError> {
    for &v in values {
        ensure_finite(v, what)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_mixes_absolute_and_relative() {
        let tol = Tolerances::default();
        // Flux-sized values pass on the absolute bound.
        assert!(nearly_equal(0.0, 5e-13, tol));
        // Voltage-sized values pass on the relative bound.
        assert!(nearly_equal(386.666_666_7, 386.666_666_7 * (1.0 + 1e-10), tol));
        assert!(!nearly_equal(386.7, 386.8, tol));
    }

    #[test]
    fn ensure_finite_names_the_quantity() {
        let err = ensure_finite(Real::NAN, "psi_d").unwrap_err();
        assert!(format!("{err}").contains("psi_d"));
        assert_eq!(ensure_finite(-10.0, "i_d"), Ok(-10.0));
    }

    #[test]
    fn ensure_all_finite_reports_first_offender() {
        assert!(ensure_all_finite(&[0.1, -0.05], "flux").is_ok());
        let err = ensure_all_finite(&[1.0, Real::INFINITY, Real::NAN], "u").unwrap_err();
        assert_eq!(
            err,
            CoreError::NonFinite {
                what: "u",
                value: Real::INFINITY
            }
        );
    }
}
