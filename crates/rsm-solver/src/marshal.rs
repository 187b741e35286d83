//! Array layout at the solver boundary.
//!
//! The external engine stores matrices column-major. nalgebra does too, so
//! flattening is a copy of the backing slice; the helpers exist so every
//! crossing goes through one checked place.

use crate::error::{SolverError, SolverResult};
use crate::field::Field;
use nalgebra::{DMatrix, DVector};

/// Column-major copy of `m`.
pub fn to_col_major(m: &DMatrix<f64>) -> Vec<f64> {
    m.as_slice().to_vec()
}

/// Rebuild a `rows × cols` matrix from column-major data.
pub fn from_col_major(rows: usize, cols: usize, data: &[f64]) -> SolverResult<DMatrix<f64>> {
    if data.len() != rows * cols {
        return Err(SolverError::Backend {
            message: format!(
                "matrix data has {} entries, expected {rows}x{cols}",
                data.len()
            ),
        });
    }
    Ok(DMatrix::from_column_slice(rows, cols, data))
}

/// Check an array length against the layout of `field` at `stage`.
pub fn expect_len(field: Field, stage: usize, expected: usize, actual: usize) -> SolverResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SolverError::interface(
            field,
            stage,
            format!("expected {expected} values, got {actual}"),
        ))
    }
}

pub fn to_dvector(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}
