//! Optimal control problem assembly.
//!
//! Turns the machine model, a voltage-limit formulation and the horizon
//! settings into one validated, immutable [`OcpProblem`] laid out the way a
//! multiple-shooting RTI solver expects it.

pub mod constraints;
pub mod cost;
pub mod dims;
pub mod error;
pub mod problem;

pub use constraints::ConstraintSet;
pub use cost::{CostWeights, LinearLsCost};
pub use dims::{ModeDims, OcpDims};
pub use error::{FormulationError, FormulationResult};
pub use problem::{OcpBuilder, OcpProblem, OcpSettings, OcpSummary, assemble};
