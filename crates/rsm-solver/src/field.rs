//! Field vocabulary accepted at the solver boundary.

use crate::error::SolverError;
use rsm_ocp::OcpDims;
use std::fmt;
use std::str::FromStr;

/// Named per-stage arrays a caller may get or set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// State iterate.
    X,
    /// Control iterate.
    U,
    /// Algebraic iterate.
    Z,
    Lbx,
    Ubx,
    Lbu,
    Ubu,
    Lg,
    Ug,
    Lh,
    Uh,
    /// Stage parameters.
    P,
    /// Tracking target.
    Yref,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::X,
        Field::U,
        Field::Z,
        Field::Lbx,
        Field::Ubx,
        Field::Lbu,
        Field::Ubu,
        Field::Lg,
        Field::Ug,
        Field::Lh,
        Field::Uh,
        Field::P,
        Field::Yref,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::X => "x",
            Field::U => "u",
            Field::Z => "z",
            Field::Lbx => "lbx",
            Field::Ubx => "ubx",
            Field::Lbu => "lbu",
            Field::Ubu => "ubu",
            Field::Lg => "lg",
            Field::Ug => "ug",
            Field::Lh => "lh",
            Field::Uh => "uh",
            Field::P => "p",
            Field::Yref => "yref",
        }
    }

    /// Primal iterates, as opposed to problem data.
    pub fn is_iterate(self) -> bool {
        matches!(self, Field::X | Field::U | Field::Z)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| SolverError::interface(s, 0, "field is not part of the solver vocabulary"))
    }
}

/// Array length of `field` at `stage`, `None` where the field does not exist.
///
/// Stage `N` is terminal: it carries no control, no algebraic variable and
/// only the terminal constraint counts, which are zero for every mode.
pub fn field_len(dims: &OcpDims, stage: usize, field: Field) -> Option<usize> {
    if stage > dims.n {
        return None;
    }
    let terminal = stage == dims.n;
    let len = match field {
        Field::X => dims.nx,
        Field::P => dims.np,
        Field::U if !terminal => dims.nu,
        Field::Z if !terminal => dims.nz,
        Field::Yref => {
            if terminal {
                dims.ny_e
            } else {
                dims.ny
            }
        }
        Field::Lbx | Field::Ubx => {
            if stage == 0 {
                dims.nbx_0
            } else if terminal {
                dims.mode.nbx_e
            } else {
                0
            }
        }
        Field::Lbu | Field::Ubu if !terminal => dims.nbu(),
        Field::Lg | Field::Ug => {
            if terminal {
                dims.mode.ng_e
            } else {
                dims.ng()
            }
        }
        Field::Lh | Field::Uh => {
            if terminal {
                dims.mode.nh_e
            } else {
                dims.nh()
            }
        }
        _ => 0,
    };
    (len > 0).then_some(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_model::{Formulation, MachineParams, export_dae_model};

    fn dims(f: Formulation) -> OcpDims {
        OcpDims::new(&export_dae_model(&MachineParams::default()), f, 2).unwrap()
    }

    #[test]
    fn names_roundtrip() {
        for f in Field::ALL {
            assert_eq!(f.as_str().parse::<Field>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_name_is_interface_error() {
        let err = "pi".parse::<Field>().unwrap_err();
        assert!(matches!(err, SolverError::Interface { field, .. } if field == "pi"));
    }

    #[test]
    fn initial_state_bound_only_at_stage_zero() {
        let d = dims(Formulation::Sphere);
        assert_eq!(field_len(&d, 0, Field::Lbx), Some(2));
        assert_eq!(field_len(&d, 1, Field::Lbx), None);
        assert_eq!(field_len(&d, 2, Field::Ubx), None);
    }

    #[test]
    fn terminal_stage_has_no_control() {
        let d = dims(Formulation::Sphere);
        assert_eq!(field_len(&d, 1, Field::U), Some(2));
        assert_eq!(field_len(&d, 2, Field::U), None);
        assert_eq!(field_len(&d, 2, Field::X), Some(2));
        assert_eq!(field_len(&d, 2, Field::Yref), Some(2));
        assert_eq!(field_len(&d, 3, Field::X), None);
    }

    #[test]
    fn constraint_fields_follow_mode() {
        let poly = dims(Formulation::Polytope);
        assert_eq!(field_len(&poly, 0, Field::Lbu), Some(1));
        assert_eq!(field_len(&poly, 0, Field::Lg), Some(2));
        assert_eq!(field_len(&poly, 0, Field::Lh), None);

        let sphere = dims(Formulation::Sphere);
        assert_eq!(field_len(&sphere, 0, Field::Lbu), None);
        assert_eq!(field_len(&sphere, 1, Field::Uh), Some(1));
        assert_eq!(field_len(&sphere, 2, Field::Uh), None);
    }
}
