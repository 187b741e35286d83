//! Closed loop over the in-process RTI backend.

use rsm_model::{Formulation, Hexagon};
use rsm_ocp::{OcpSettings, assemble};
use rsm_sim::{ClosedLoopDriver, SimError};
use rsm_solver::EmbeddedRti;

fn run(formulation: Formulation, n_sim: usize) -> (ClosedLoopDriver, rsm_ocp::OcpProblem) {
    let problem = assemble(OcpSettings {
        formulation,
        ..OcpSettings::default()
    })
    .unwrap();
    let mut driver = ClosedLoopDriver::open(&EmbeddedRti::default(), &problem, n_sim).unwrap();
    driver.run().unwrap();
    (driver, problem)
}

#[test]
fn default_scenario_reaches_reference_flux() {
    let (driver, problem) = run(Formulation::Sphere, 100);
    let log = driver.log();
    assert_eq!(log.len(), 100);
    assert_eq!(log.entries()[0].x, vec![0.0, 0.0]);

    let target = problem.reference().state();
    let last = &log.last().unwrap().x;
    let err = (last[0] - target[0]).hypot(last[1] - target[1]);
    assert!(err < 0.05, "final flux {last:?}, target {target:?}");

    let u_max = problem.settings().u_max_v();
    for u in log.controls() {
        assert!(u[0].hypot(u[1]) <= u_max * (1.0 + 1e-6), "{u:?}");
    }
}

#[test]
fn polytope_run_stays_inside_hexagon() {
    let (driver, problem) = run(Formulation::Polytope, 30);
    let hex = Hexagon::new(problem.settings().u_max_v()).unwrap();
    for u in driver.log().controls() {
        assert!(hex.contains([u[0], u[1]], 1e-6), "{u:?}");
    }
    assert_eq!(driver.stats().count(), 30);
}

#[test]
fn log_times_follow_sampling_period() {
    let (driver, problem) = run(Formulation::ScqpSphere, 5);
    let ts = problem.ts();
    for (k, e) in driver.log().entries().iter().enumerate() {
        assert!((e.t - k as f64 * ts).abs() < 1e-12);
    }
}

#[test]
fn rerun_is_rejected_after_release() {
    let (mut driver, _) = run(Formulation::Sphere, 1);
    assert!(matches!(driver.run(), Err(SimError::InvalidArg { .. })));
}
