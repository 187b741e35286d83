//! Narrow adapter over a real-time-iteration NLP solver.
//!
//! The core only talks to a solver through [`NlpSolver`]: `solve`, `get`,
//! `set` and `free` on a fixed [`Field`] vocabulary. [`SolverSession`] owns
//! the handle, checks every array against the problem layout and releases
//! the handle exactly once.
//!
//! Backends:
//! - [`EmbeddedRti`]: in-process Gauss-Newton RTI step with implicit Euler
//!   integration of the DAE
//! - `ffi::AcadosBackend` (feature `acados`): the generated C solver

pub mod backend;
pub mod embedded;
pub mod error;
pub mod field;
pub mod integrator;
pub mod marshal;
pub mod session;
pub mod status;

#[cfg(feature = "acados")]
pub mod ffi;

pub use backend::{NlpSolver, SolverBackend};
pub use embedded::{EmbeddedRti, RtiConfig};
pub use error::{SolverError, SolverResult};
pub use field::{Field, field_len};
pub use integrator::ImplicitEuler;
pub use session::SolverSession;
pub use status::SolveStatus;
