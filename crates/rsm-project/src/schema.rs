//! Scenario schema definitions.

use rsm_model::Formulation;
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

/// One closed-loop experiment: machine, operating point, actuation limit and
/// controller horizon, all fixed at session start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDef {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub machine: MachineDef,
    pub reference: ReferenceDef,
    pub actuation: ActuationDef,
    pub horizon: HorizonDef,
    #[serde(default)]
    pub closed_loop: ClosedLoopDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightsDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineDef {
    pub rs_ohm: f64,
}

impl Default for MachineDef {
    fn default() -> Self {
        Self { rs_ohm: 0.4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceDef {
    pub i_d_a: f64,
    pub i_q_a: f64,
    pub speed_rad_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuationDef {
    /// DC-link voltage; the hexagon radius is two thirds of it.
    pub udc_v: f64,
    #[serde(default)]
    pub formulation: Formulation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HorizonDef {
    pub ts_s: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedLoopDef {
    pub n_sim: usize,
}

impl Default for ClosedLoopDef {
    fn default() -> Self {
        Self { n_sim: 100 }
    }
}

/// Diagonal cost weights; `q` and `r` are scaled by `ts_s` when assembled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightsDef {
    pub q: Vec<f64>,
    pub r: Vec<f64>,
    pub qn: Vec<f64>,
}

impl Default for ScenarioDef {
    fn default() -> Self {
        Self {
            version: LATEST_VERSION,
            name: "default".to_string(),
            machine: MachineDef::default(),
            reference: ReferenceDef {
                i_d_a: -10.0,
                i_q_a: 20.0,
                speed_rad_s: 300.0,
            },
            actuation: ActuationDef {
                udc_v: 580.0,
                formulation: Formulation::Sphere,
            },
            horizon: HorizonDef { ts_s: 0.0008, n: 2 },
            closed_loop: ClosedLoopDef::default(),
            weights: None,
        }
    }
}
