//! Content-based hashing for run IDs.

use crate::ResultsResult;
use crate::types::RunId;
use rsm_project::ScenarioDef;
use sha2::{Digest, Sha256};

/// Same scenario on the same backend gives the same id.
pub fn compute_run_id(scenario: &ScenarioDef, backend: &str) -> ResultsResult<RunId> {
    let mut hasher = Sha256::new();

    let scenario_json = serde_json::to_string(scenario)?;
    hasher.update(scenario_json.as_bytes());
    hasher.update(backend.as_bytes());

    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &ScenarioDef, backend: &str) -> RunId {
        compute_run_id(s, backend).unwrap()
    }

    #[test]
    fn hash_stability() {
        let s = ScenarioDef::default();
        assert_eq!(id(&s, "embedded-rti"), id(&s, "embedded-rti"));
        let run_id = id(&s, "embedded-rti");
        assert_eq!(run_id.len(), 64);
        assert!(run_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = ScenarioDef::default();
        let mut b = ScenarioDef::default();
        b.reference.i_q_a = 25.0;
        assert_ne!(id(&a, "embedded-rti"), id(&b, "embedded-rti"));
        assert_ne!(id(&a, "embedded-rti"), id(&a, "acados"));
    }

    #[test]
    fn scenarios_differing_only_in_weights_get_distinct_ids() {
        let a = ScenarioDef::default();
        let mut b = ScenarioDef::default();
        b.weights = Some(rsm_project::WeightsDef {
            q: vec![1.0, 1.0],
            r: vec![1e-4, 1e-4],
            qn: vec![1.0, 1.0],
        });
        assert_ne!(id(&a, "embedded-rti"), id(&b, "embedded-rti"));
    }
}
