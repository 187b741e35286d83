//! Session over the in-process backend, driven the way the closed loop uses it.

use rsm_model::Formulation;
use rsm_ocp::{OcpSettings, assemble};
use rsm_solver::{EmbeddedRti, Field, SolveStatus, SolverError, SolverSession};

fn open(formulation: Formulation) -> SolverSession {
    let problem = assemble(OcpSettings {
        formulation,
        ..OcpSettings::default()
    })
    .unwrap();
    SolverSession::open(&EmbeddedRti::default(), &problem).unwrap()
}

#[test]
fn session_reports_backend_and_layout() {
    let s = open(Formulation::Polytope);
    assert_eq!(s.backend_name(), "embedded-rti");
    assert_eq!(s.dims().n, 2);
    assert_eq!(s.get(0, Field::Lbu).unwrap().len(), 1);
    assert_eq!(s.get(1, Field::Lg).unwrap().len(), 2);
    assert!(s.get(2, Field::Lg).is_err());
}

#[test]
fn problem_data_reads_back_what_was_assembled() {
    let s = open(Formulation::Sphere);
    let u_max = 2.0 / 3.0 * 580.0;
    assert_eq!(s.get(0, Field::Uh).unwrap(), vec![u_max * u_max]);
    assert_eq!(s.get(1, Field::P).unwrap(), vec![300.0, 0.0, 0.0]);
    assert_eq!(s.get(2, Field::Yref).unwrap().len(), 2);
    assert_eq!(s.get(0, Field::Yref).unwrap().len(), 4);
}

#[test]
fn tightened_limit_is_respected_next_solve() {
    let mut s = open(Formulation::Sphere);
    for k in 0..2 {
        s.set(k, Field::Uh, &[100.0 * 100.0]).unwrap();
    }
    assert_eq!(s.solve().unwrap(), SolveStatus::Success);
    let u = s.get(0, Field::U).unwrap();
    assert!(u[0].hypot(u[1]) <= 100.0 * (1.0 + 1e-6), "{u:?}");
}

#[test]
fn disturbance_parameter_reaches_the_solver() {
    let mut s = open(Formulation::Sphere);
    for k in 0..=2 {
        s.set_named(k, "p", &[300.0, 5.0, -5.0]).unwrap();
    }
    assert_eq!(s.get_named(2, "p").unwrap(), vec![300.0, 5.0, -5.0]);
    assert_eq!(s.solve().unwrap(), SolveStatus::Success);
}

#[test]
fn release_then_access_fails_cleanly() {
    let mut s = open(Formulation::ScqpSphere);
    assert_eq!(s.solve().unwrap(), SolveStatus::Success);
    s.release().unwrap();
    assert!(!s.is_live());
    assert_eq!(s.get(0, Field::U), Err(SolverError::AlreadyReleased));
    assert_eq!(s.release(), Err(SolverError::AlreadyReleased));
}

#[test]
fn scqp_sphere_solves_like_sphere_in_process() {
    let mut sphere = open(Formulation::Sphere);
    let mut scqp = open(Formulation::ScqpSphere);
    assert_eq!(sphere.solve().unwrap(), SolveStatus::Success);
    assert_eq!(scqp.solve().unwrap(), SolveStatus::Success);
    assert_eq!(sphere.get(0, Field::U).unwrap(), scqp.get(0, Field::U).unwrap());
}
