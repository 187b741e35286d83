//! Scenario loading and conversion into problem settings.

use std::path::Path;

use rsm_core::{amp, ohm, rad_per_s, s, volt};
use rsm_model::{MachineParams, voltage_limit_from_dc_link};
use rsm_ocp::{CostWeights, OcpProblem, OcpSettings, assemble};
use rsm_project::ScenarioDef;

use crate::error::{AppError, AppResult};

/// Load and validate a scenario (`.json` or YAML).
pub fn load_scenario(path: &Path) -> AppResult<ScenarioDef> {
    if !path.exists() {
        return Err(AppError::ScenarioFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    Ok(rsm_project::load(path)?)
}

/// Scenario fields mapped onto the assembler's typed settings.
pub fn settings_from_scenario(scenario: &ScenarioDef) -> AppResult<OcpSettings> {
    rsm_project::validate_scenario(scenario).map_err(rsm_project::ProjectError::from)?;

    let machine = MachineParams {
        rs: ohm(scenario.machine.rs_ohm),
        ..MachineParams::default()
    };
    let weights = match &scenario.weights {
        Some(w) => CostWeights {
            q: w.q.clone(),
            r: w.r.clone(),
            qn: w.qn.clone(),
        },
        None => CostWeights::default(),
    };

    Ok(OcpSettings {
        machine,
        i_d_ref: amp(scenario.reference.i_d_a),
        i_q_ref: amp(scenario.reference.i_q_a),
        speed: rad_per_s(scenario.reference.speed_rad_s),
        disturbance: [0.0, 0.0],
        u_max: voltage_limit_from_dc_link(volt(scenario.actuation.udc_v)),
        ts: s(scenario.horizon.ts_s),
        n: scenario.horizon.n,
        formulation: scenario.actuation.formulation,
        weights,
    })
}

/// Assemble the optimal control problem of a scenario.
pub fn formulate(scenario: &ScenarioDef) -> AppResult<OcpProblem> {
    Ok(assemble(settings_from_scenario(scenario)?)?)
}
