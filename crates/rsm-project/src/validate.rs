//! Scenario validation logic.

use crate::schema::{LATEST_VERSION, ScenarioDef, WeightsDef};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, v, "must be positive and finite"))
    }
}

fn finite(field: &str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, v, "must be finite"))
    }
}

pub fn validate_scenario(scenario: &ScenarioDef) -> Result<(), ValidationError> {
    if scenario.version == 0 || scenario.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: scenario.version,
        });
    }
    if scenario.name.trim().is_empty() {
        return Err(invalid("name", "", "must not be empty"));
    }

    positive("machine.rs_ohm", scenario.machine.rs_ohm)?;
    finite("reference.i_d_a", scenario.reference.i_d_a)?;
    finite("reference.i_q_a", scenario.reference.i_q_a)?;
    finite("reference.speed_rad_s", scenario.reference.speed_rad_s)?;
    positive("actuation.udc_v", scenario.actuation.udc_v)?;
    positive("horizon.ts_s", scenario.horizon.ts_s)?;
    if scenario.horizon.n == 0 {
        return Err(invalid("horizon.n", 0, "need at least one shooting interval"));
    }

    if let Some(w) = &scenario.weights {
        validate_weights(w)?;
    }
    Ok(())
}

fn validate_weights(w: &WeightsDef) -> Result<(), ValidationError> {
    for (field, values) in [("weights.q", &w.q), ("weights.r", &w.r), ("weights.qn", &w.qn)] {
        if values.len() != 2 {
            return Err(invalid(field, format!("{values:?}"), "expected one entry per axis (d, q)"));
        }
        if let Some(v) = values.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(invalid(field, v, "weights must be finite and non-negative"));
        }
    }
    Ok(())
}
