//! Backend selection.

use crate::error::{AppError, AppResult};
use rsm_solver::{EmbeddedRti, SolverBackend};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process RTI step.
    #[default]
    Embedded,
    /// Generated acados solver; needs the `acados` feature.
    Acados,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "embedded" | "embedded-rti" => Ok(BackendKind::Embedded),
            "acados" => Ok(BackendKind::Acados),
            other => Err(AppError::InvalidInput(format!(
                "unknown backend '{other}' (expected embedded or acados)"
            ))),
        }
    }
}

pub fn make_backend(kind: BackendKind) -> AppResult<Box<dyn SolverBackend>> {
    match kind {
        BackendKind::Embedded => Ok(Box::new(EmbeddedRti::default())),
        #[cfg(feature = "acados")]
        BackendKind::Acados => Ok(Box::new(rsm_solver::ffi::AcadosBackend)),
        #[cfg(not(feature = "acados"))]
        BackendKind::Acados => Err(AppError::InvalidInput(
            "built without the `acados` feature".to_string(),
        )),
    }
}
