//! Physical model and actuation limits of the synchronous-machine current controller.
//!
//! - `flux`: curve-fit flux linkage map ψ(i) and its numeric inverse
//! - `dae`: implicit DAE `F(xdot, x, z, u, p) = 0` as an expression graph
//! - `limits`: voltage limit as a hexagonal polytope or a smooth sphere
//! - `reference`: steady-state operating point for a commanded current

pub mod dae;
pub mod error;
pub mod flux;
pub mod limits;
pub mod reference;

pub use dae::{DaeModel, MODEL_NAME, MachineParams, export_dae_model};
pub use error::{ModelError, ModelResult};
pub use flux::{AxisFit, FluxMap};
pub use limits::{
    Formulation, Hexagon, NonlinearConstraint, PolytopeConstraints, general_constraints_dc,
    voltage_limit_from_dc_link, voltage_sphere_constraint,
};
pub use reference::{OperatingPoint, steady_state_reference};
