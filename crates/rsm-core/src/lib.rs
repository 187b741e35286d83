//! rsm-core: shared foundation for the synchronous-machine MPC workspace.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + tolerances + float helpers)
//! - expr (symbolic expression graph used for model and constraint export)
//! - newton / jacobian (small dense nonlinear solves on nalgebra)
//! - timing (wall-clock timer for solver calls)
//! - error (shared error types)

pub mod error;
pub mod expr;
pub mod jacobian;
pub mod newton;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use expr::{Bindings, Expr, Scalar, SymbolSet};
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
pub use numeric::*;
pub use timing::Timer;
pub use units::*;
