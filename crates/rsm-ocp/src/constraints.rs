//! Stage constraint arrays per formulation mode.

use crate::dims::OcpDims;
use crate::error::{FormulationError, FormulationResult, check_len, check_shape};
use nalgebra::DMatrix;
use rsm_model::{
    DaeModel, Formulation, NonlinearConstraint, general_constraints_dc, voltage_sphere_constraint,
};

/// Bounds and constraint blocks shared by all intermediate stages, plus the
/// initial-state bound at stage 0.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSet {
    pub idxbx_0: Vec<usize>,
    pub lbx_0: Vec<f64>,
    pub ubx_0: Vec<f64>,

    pub idxbu: Vec<usize>,
    pub lbu: Vec<f64>,
    pub ubu: Vec<f64>,

    /// `ng × nx`, acts on the state.
    pub c: DMatrix<f64>,
    /// `ng × nu`, acts on the control.
    pub d: DMatrix<f64>,
    pub lg: Vec<f64>,
    pub ug: Vec<f64>,

    pub nonlinear: Option<NonlinearConstraint>,
    /// Convexified copy of the nonlinear block (SCQP mode only). Only the
    /// generated acados solver uses it; the embedded backend ignores it and
    /// projects on the sphere.
    pub convex_part: Option<NonlinearConstraint>,
}

impl ConstraintSet {
    /// Assemble the arrays a formulation mode needs and leave the rest empty.
    pub fn for_formulation(
        formulation: Formulation,
        u_max: f64,
        nx: usize,
        nu: usize,
    ) -> FormulationResult<Self> {
        let mut set = Self::unconstrained(nx, nu);
        match formulation {
            Formulation::Polytope => {
                let poly = general_constraints_dc(u_max, nx)?;
                set.idxbu = poly.idxbu;
                set.lbu = poly.lbu;
                set.ubu = poly.ubu;
                set.c = poly.c;
                set.d = poly.d;
                set.lg = poly.lg;
                set.ug = poly.ug;
            }
            Formulation::Sphere => {
                set.nonlinear = Some(voltage_sphere_constraint(u_max)?);
            }
            Formulation::ScqpSphere => {
                let sphere = voltage_sphere_constraint(u_max)?;
                let mut pd = sphere.clone();
                pd.name = "v_sphere_pd".to_string();
                set.nonlinear = Some(sphere);
                set.convex_part = Some(pd);
            }
        }
        Ok(set)
    }

    /// Only the initial-state bound, fixed at zero.
    pub fn unconstrained(nx: usize, nu: usize) -> Self {
        Self {
            idxbx_0: (0..nx).collect(),
            lbx_0: vec![0.0; nx],
            ubx_0: vec![0.0; nx],
            idxbu: Vec::new(),
            lbu: Vec::new(),
            ubu: Vec::new(),
            c: DMatrix::zeros(0, nx),
            d: DMatrix::zeros(0, nu),
            lg: Vec::new(),
            ug: Vec::new(),
            nonlinear: None,
            convex_part: None,
        }
    }

    /// Lower/upper bounds of the nonlinear block, empty when absent.
    pub fn lh(&self) -> &[f64] {
        self.nonlinear.as_ref().map(|h| h.lh.as_slice()).unwrap_or(&[])
    }

    pub fn uh(&self) -> &[f64] {
        self.nonlinear.as_ref().map(|h| h.uh.as_slice()).unwrap_or(&[])
    }

    /// Cross-check every array against `dims` and the model's symbols.
    pub fn validate(&self, dims: &OcpDims, model: &DaeModel) -> FormulationResult<()> {
        check_len("idxbx_0", dims.nbx_0, self.idxbx_0.len())?;
        check_len("lbx_0", dims.nbx_0, self.lbx_0.len())?;
        check_len("ubx_0", dims.nbx_0, self.ubx_0.len())?;
        check_indices("idxbx_0", &self.idxbx_0, dims.nx)?;
        check_ordered("bx_0", &self.lbx_0, &self.ubx_0)?;

        check_len("idxbu", dims.nbu(), self.idxbu.len())?;
        check_len("lbu", dims.nbu(), self.lbu.len())?;
        check_len("ubu", dims.nbu(), self.ubu.len())?;
        check_indices("idxbu", &self.idxbu, dims.nu)?;
        check_ordered("bu", &self.lbu, &self.ubu)?;

        check_shape("C", (dims.ng(), dims.nx), self.c.shape())?;
        check_shape("D", (dims.ng(), dims.nu), self.d.shape())?;
        check_len("lg", dims.ng(), self.lg.len())?;
        check_len("ug", dims.ng(), self.ug.len())?;
        check_ordered("g", &self.lg, &self.ug)?;

        check_block("h", dims.nh(), self.nonlinear.as_ref(), model)?;
        check_block("pd", dims.npd(), self.convex_part.as_ref(), model)?;
        Ok(())
    }
}

fn check_indices(what: &'static str, idx: &[usize], limit: usize) -> FormulationResult<()> {
    match idx.iter().find(|&&i| i >= limit) {
        Some(&index) => Err(FormulationError::IndexOutOfRange { what, index, limit }),
        None => Ok(()),
    }
}

fn check_ordered(what: &'static str, lower: &[f64], upper: &[f64]) -> FormulationResult<()> {
    for (index, (&l, &u)) in lower.iter().zip(upper).enumerate() {
        if l.is_nan() || u.is_nan() || l > u {
            return Err(FormulationError::InconsistentBounds {
                what,
                index,
                lower: l,
                upper: u,
            });
        }
    }
    Ok(())
}

fn check_block(
    block: &'static str,
    declared: usize,
    constraint: Option<&NonlinearConstraint>,
    model: &DaeModel,
) -> FormulationResult<()> {
    let Some(con) = constraint else {
        return if declared == 0 {
            Ok(())
        } else {
            Err(FormulationError::MissingExpression { block })
        };
    };
    check_len(&format!("{block} expression"), declared, con.nc())?;
    con.validate()?;
    for expr in &con.expr {
        for name in expr.free_symbols() {
            if !model.x.contains(&name) && !model.u.contains(&name) {
                return Err(FormulationError::UndeclaredSymbol {
                    name,
                    context: format!("constraint block '{block}'"),
                });
            }
        }
    }
    check_ordered("h", &con.lh, &con.uh)
}
