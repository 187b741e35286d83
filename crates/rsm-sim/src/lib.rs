//! Closed-loop execution of the current controller.
//!
//! Provides:
//! - `ClosedLoopDriver`: fixed-count loop of solve, extract, log and shift
//! - `TrajectoryLog`: append-only record of `(x_0, u_0)` per sampling instant
//! - `StepStats`: wall time of every solve against the sampling period

pub mod driver;
pub mod error;
pub mod log;
pub mod stats;

pub use driver::{ClosedLoopDriver, ClosedLoopOptions};
pub use error::{SimError, SimResult};
pub use log::{TrajectoryEntry, TrajectoryLog};
pub use stats::{StatsSummary, StepStats};
