//! Steady-state operating point for a commanded current.

use crate::dae::{CROSS_COUPLING, MachineParams};
use rsm_core::units::raw;
use rsm_core::{AngularVelocity, Current};

/// Equilibrium of the machine at constant speed and zero disturbance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OperatingPoint {
    pub i_d: f64,
    pub i_q: f64,
    pub w: f64,
    pub psi_d: f64,
    pub psi_q: f64,
    pub u_d: f64,
    pub u_q: f64,
}

impl OperatingPoint {
    pub fn state(&self) -> [f64; 2] {
        [self.psi_d, self.psi_q]
    }

    pub fn control(&self) -> [f64; 2] {
        [self.u_d, self.u_q]
    }

    pub fn currents(&self) -> [f64; 2] {
        [self.i_d, self.i_q]
    }

    /// Stage tracking target `[ψ_d, ψ_q, u_d, u_q]`.
    pub fn stage_reference(&self) -> [f64; 4] {
        [self.psi_d, self.psi_q, self.u_d, self.u_q]
    }

    /// Terminal tracking target `[ψ_d, ψ_q]`.
    pub fn terminal_reference(&self) -> [f64; 2] {
        [self.psi_d, self.psi_q]
    }
}

/// Flux from the fitted map, voltage from the flux dynamics with ψ̇ = 0:
/// `u = Rs·i + ω·J·ψ`.
pub fn steady_state_reference(
    params: &MachineParams,
    i_d_ref: Current,
    i_q_ref: Current,
    w: AngularVelocity,
) -> OperatingPoint {
    let i = [raw::amps(i_d_ref), raw::amps(i_q_ref)];
    let w = raw::rad_s(w);
    let rs = params.rs_ohm();
    let psi = params.flux_map.flux(i[0], i[1]);

    let mut u = [0.0; 2];
    for axis in 0..2 {
        let coupling: f64 = (0..2).map(|j| CROSS_COUPLING[axis][j] * psi[j]).sum();
        u[axis] = rs * i[axis] + w * coupling;
    }

    OperatingPoint {
        i_d: i[0],
        i_q: i[1],
        w,
        psi_d: psi[0],
        psi_q: psi[1],
        u_d: u[0],
        u_q: u[1],
    }
}
