//! Bindings to the generated acados solver for the `rsm` model.
//!
//! Expects `libacados_solver_rsm` and `libacados` on the linker path. The
//! generated library bakes in the dimensions; `create` checks them against
//! the assembled problem and then pushes every numeric array, so the Rust
//! side stays the single source of truth for bounds, weights and references.

use crate::backend::{NlpSolver, SolverBackend};
use crate::error::{SolverError, SolverResult};
use crate::field::Field;
use crate::marshal::to_col_major;
use crate::status::SolveStatus;
use rsm_model::MODEL_NAME;
use rsm_ocp::OcpProblem;
use std::collections::HashMap;
use std::ffi::{CString, c_char, c_int, c_void};
use tracing::info;

#[repr(C)]
pub struct RsmSolverCapsule {
    _private: [u8; 0],
}

#[link(name = "acados_solver_rsm")]
unsafe extern "C" {
    fn rsm_acados_create_capsule() -> *mut RsmSolverCapsule;
    fn rsm_acados_create(capsule: *mut RsmSolverCapsule) -> c_int;
    fn rsm_acados_solve(capsule: *mut RsmSolverCapsule) -> c_int;
    fn rsm_acados_free(capsule: *mut RsmSolverCapsule) -> c_int;
    fn rsm_acados_free_capsule(capsule: *mut RsmSolverCapsule) -> c_int;
    fn rsm_acados_update_params(
        capsule: *mut RsmSolverCapsule,
        stage: c_int,
        value: *mut f64,
        np: c_int,
    ) -> c_int;
    fn rsm_acados_get_nlp_config(capsule: *mut RsmSolverCapsule) -> *mut c_void;
    fn rsm_acados_get_nlp_dims(capsule: *mut RsmSolverCapsule) -> *mut c_void;
    fn rsm_acados_get_nlp_in(capsule: *mut RsmSolverCapsule) -> *mut c_void;
    fn rsm_acados_get_nlp_out(capsule: *mut RsmSolverCapsule) -> *mut c_void;
}

#[link(name = "acados")]
unsafe extern "C" {
    fn ocp_nlp_out_get(
        config: *mut c_void,
        dims: *mut c_void,
        out: *mut c_void,
        stage: c_int,
        field: *const c_char,
        value: *mut c_void,
    );
    fn ocp_nlp_out_set(
        config: *mut c_void,
        dims: *mut c_void,
        out: *mut c_void,
        stage: c_int,
        field: *const c_char,
        value: *mut c_void,
    );
    fn ocp_nlp_constraints_model_set(
        config: *mut c_void,
        dims: *mut c_void,
        nlp_in: *mut c_void,
        stage: c_int,
        field: *const c_char,
        value: *mut c_void,
    ) -> c_int;
    fn ocp_nlp_cost_model_set(
        config: *mut c_void,
        dims: *mut c_void,
        nlp_in: *mut c_void,
        stage: c_int,
        field: *const c_char,
        value: *mut c_void,
    ) -> c_int;
    fn ocp_nlp_dims_get_from_attr(
        config: *mut c_void,
        dims: *mut c_void,
        out: *mut c_void,
        stage: c_int,
        field: *const c_char,
    ) -> c_int;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AcadosBackend;

impl SolverBackend for AcadosBackend {
    fn name(&self) -> &'static str {
        "acados"
    }

    fn create(&self, problem: &OcpProblem) -> SolverResult<Box<dyn NlpSolver>> {
        Ok(Box::new(AcadosSolver::new(problem)?))
    }
}

/// Owned handle to a generated acados capsule.
pub struct AcadosSolver {
    capsule: *mut RsmSolverCapsule,
    config: *mut c_void,
    dims: *mut c_void,
    nlp_in: *mut c_void,
    nlp_out: *mut c_void,
    /// Last values written for problem-data fields, keyed by stage.
    inputs: HashMap<(usize, Field), Vec<f64>>,
}

fn c_field(name: &str) -> SolverResult<CString> {
    CString::new(name).map_err(|e| SolverError::Backend {
        message: format!("field name '{name}': {e}"),
    })
}

fn c_stage(stage: usize) -> SolverResult<c_int> {
    c_int::try_from(stage).map_err(|_| SolverError::interface("stage", stage, "stage index overflows c_int"))
}

impl AcadosSolver {
    pub fn new(problem: &OcpProblem) -> SolverResult<Self> {
        // SAFETY: the capsule functions are generated together with the
        // library and only touch memory they allocate themselves.
        let capsule = unsafe { rsm_acados_create_capsule() };
        if capsule.is_null() {
            return Err(SolverError::Create {
                what: "capsule allocation returned null".to_string(),
            });
        }
        let code = unsafe { rsm_acados_create(capsule) };
        if code != 0 {
            unsafe {
                rsm_acados_free_capsule(capsule);
            }
            return Err(SolverError::Create {
                what: format!("rsm_acados_create returned {code}"),
            });
        }

        let mut solver = unsafe {
            Self {
                capsule,
                config: rsm_acados_get_nlp_config(capsule),
                dims: rsm_acados_get_nlp_dims(capsule),
                nlp_in: rsm_acados_get_nlp_in(capsule),
                nlp_out: rsm_acados_get_nlp_out(capsule),
                inputs: HashMap::new(),
            }
        };
        solver.check_dims(problem)?;
        solver.load_problem(problem)?;
        info!(model = MODEL_NAME, "acados solver created");
        Ok(solver)
    }

    fn generated_dim(&self, stage: usize, field: &str) -> SolverResult<usize> {
        let name = c_field(field)?;
        let stage = c_stage(stage)?;
        // SAFETY: pointers come from a live capsule.
        let n = unsafe {
            ocp_nlp_dims_get_from_attr(self.config, self.dims, self.nlp_out, stage, name.as_ptr())
        };
        usize::try_from(n).map_err(|_| SolverError::Backend {
            message: format!("negative dimension {n} for '{field}'"),
        })
    }

    fn check_dims(&self, problem: &OcpProblem) -> SolverResult<()> {
        let d = problem.dims();
        for (field, expected) in [("x", d.nx), ("u", d.nu), ("z", d.nz), ("y_ref", d.ny)] {
            let actual = self.generated_dim(0, field)?;
            if actual != expected {
                return Err(SolverError::Create {
                    what: format!("generated solver has {field} of size {actual}, problem has {expected}"),
                });
            }
        }
        Ok(())
    }

    fn constraints_set(&mut self, stage: usize, field: &str, values: &[f64]) -> SolverResult<()> {
        let name = c_field(field)?;
        let mut buf = values.to_vec();
        // SAFETY: `buf` outlives the call and has the size acados expects for
        // `field`, which the session checked against the layout.
        let code = unsafe {
            ocp_nlp_constraints_model_set(
                self.config,
                self.dims,
                self.nlp_in,
                c_stage(stage)?,
                name.as_ptr(),
                buf.as_mut_ptr().cast(),
            )
        };
        self.check_code(code, field, stage)
    }

    fn cost_set(&mut self, stage: usize, field: &str, values: &[f64]) -> SolverResult<()> {
        let name = c_field(field)?;
        let mut buf = values.to_vec();
        // SAFETY: as in `constraints_set`.
        let code = unsafe {
            ocp_nlp_cost_model_set(
                self.config,
                self.dims,
                self.nlp_in,
                c_stage(stage)?,
                name.as_ptr(),
                buf.as_mut_ptr().cast(),
            )
        };
        self.check_code(code, field, stage)
    }

    fn check_code(&self, code: c_int, field: &str, stage: usize) -> SolverResult<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(SolverError::Backend {
                message: format!("setting '{field}' at stage {stage} returned {code}"),
            })
        }
    }

    /// Push every array of the assembled problem into the generated solver.
    fn load_problem(&mut self, problem: &OcpProblem) -> SolverResult<()> {
        let n = problem.n();
        let c = problem.constraints();
        let cost = problem.cost();

        for stage in 0..=n {
            if let Some(p) = problem.parameters(stage) {
                self.set(stage, Field::P, p)?;
            }
            if let Some(yref) = problem.yref(stage) {
                self.set(stage, Field::Yref, yref)?;
            }
        }
        self.set(0, Field::Lbx, &c.lbx_0)?;
        self.set(0, Field::Ubx, &c.ubx_0)?;

        let w = to_col_major(&cost.w);
        let d = to_col_major(&c.d);
        let cm = to_col_major(&c.c);
        for stage in 0..n {
            self.cost_set(stage, "W", &w)?;
            if !c.lbu.is_empty() {
                self.set(stage, Field::Lbu, &c.lbu)?;
                self.set(stage, Field::Ubu, &c.ubu)?;
            }
            if !c.lg.is_empty() {
                self.constraints_set(stage, "D", &d)?;
                self.constraints_set(stage, "C", &cm)?;
                self.set(stage, Field::Lg, &c.lg)?;
                self.set(stage, Field::Ug, &c.ug)?;
            }
            if !c.lh().is_empty() {
                self.set(stage, Field::Lh, c.lh())?;
                self.set(stage, Field::Uh, c.uh())?;
            }
        }
        self.cost_set(n, "W", &to_col_major(&cost.w_e))
    }
}

impl NlpSolver for AcadosSolver {
    fn name(&self) -> &str {
        "acados"
    }

    fn solve(&mut self) -> SolverResult<SolveStatus> {
        if self.capsule.is_null() {
            return Err(SolverError::AlreadyReleased);
        }
        // SAFETY: capsule is live until `free`.
        let code = unsafe { rsm_acados_solve(self.capsule) };
        Ok(SolveStatus::from_code(code))
    }

    fn get(&self, stage: usize, field: Field) -> SolverResult<Vec<f64>> {
        if self.capsule.is_null() {
            return Err(SolverError::AlreadyReleased);
        }
        if !field.is_iterate() {
            return self
                .inputs
                .get(&(stage, field))
                .cloned()
                .ok_or_else(|| SolverError::interface(field, stage, "field was never set"));
        }
        let len = self.generated_dim(stage, field.as_str())?;
        let mut buf = vec![0.0; len];
        let name = c_field(field.as_str())?;
        // SAFETY: `buf` is sized from the generated dimensions of `field`.
        unsafe {
            ocp_nlp_out_get(
                self.config,
                self.dims,
                self.nlp_out,
                c_stage(stage)?,
                name.as_ptr(),
                buf.as_mut_ptr().cast(),
            );
        }
        Ok(buf)
    }

    fn set(&mut self, stage: usize, field: Field, values: &[f64]) -> SolverResult<()> {
        if self.capsule.is_null() {
            return Err(SolverError::AlreadyReleased);
        }
        let mut buf = values.to_vec();
        match field {
            Field::X | Field::U | Field::Z => {
                let name = c_field(field.as_str())?;
                // SAFETY: as in `constraints_set`.
                unsafe {
                    ocp_nlp_out_set(
                        self.config,
                        self.dims,
                        self.nlp_out,
                        c_stage(stage)?,
                        name.as_ptr(),
                        buf.as_mut_ptr().cast(),
                    );
                }
                return Ok(());
            }
            Field::P => {
                let np = c_int::try_from(buf.len())
                    .map_err(|_| SolverError::interface(field, stage, "too many parameters"))?;
                // SAFETY: `np` matches the buffer length.
                let code = unsafe {
                    rsm_acados_update_params(self.capsule, c_stage(stage)?, buf.as_mut_ptr(), np)
                };
                self.check_code(code, field.as_str(), stage)?;
            }
            Field::Yref => self.cost_set(stage, "yref", values)?,
            _ => self.constraints_set(stage, field.as_str(), values)?,
        }
        self.inputs.insert((stage, field), values.to_vec());
        Ok(())
    }

    fn free(&mut self) -> SolverResult<()> {
        if self.capsule.is_null() {
            return Err(SolverError::AlreadyReleased);
        }
        // SAFETY: called once; the pointer is nulled right after.
        let code = unsafe {
            let code = rsm_acados_free(self.capsule);
            rsm_acados_free_capsule(self.capsule);
            code
        };
        self.capsule = std::ptr::null_mut();
        if code != 0 {
            return Err(SolverError::Backend {
                message: format!("rsm_acados_free returned {code}"),
            });
        }
        Ok(())
    }
}
