use rsm_model::Formulation;
use std::path::PathBuf;

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

#[test]
fn shipped_scenarios_load_and_validate() {
    let dir = scenarios_dir();
    let mut count = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            rsm_project::load_yaml(&path)
                .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
            count += 1;
        }
    }
    assert!(count >= 2, "expected shipped scenarios in {}", dir.display());
}

#[test]
fn default_file_matches_builtin_default() {
    let s = rsm_project::load_yaml(&scenarios_dir().join("default.yaml")).unwrap();
    assert_eq!(s, rsm_project::ScenarioDef::default());
    assert_eq!(s.actuation.formulation, Formulation::Sphere);
}
