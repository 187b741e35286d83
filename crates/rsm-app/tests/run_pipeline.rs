use rsm_app::*;
use rsm_project::ScenarioDef;
use rsm_solver::EmbeddedRti;
use std::path::PathBuf;

fn scenario_in(dir_name: &str, n_sim: usize) -> PathBuf {
    let dir = std::env::temp_dir().join(dir_name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let mut scenario = ScenarioDef::default();
    scenario.closed_loop.n_sim = n_sim;
    let path = dir.join("scenario.yaml");
    rsm_project::save_yaml(&path, &scenario).unwrap();
    path
}

#[test]
fn run_is_stored_then_served_from_cache() {
    let path = scenario_in("rsm_app_run_cache", 8);
    let backend = EmbeddedRti::default();
    let request = RunRequest {
        scenario_path: &path,
        options: RunOptions::default(),
    };

    let first = ensure_run(&request, &backend).unwrap();
    assert!(!first.loaded_from_cache);
    assert_eq!(first.log.len(), 8);
    assert_eq!(first.manifest.steps, 8);
    assert!(first.stats.is_some());

    let second = ensure_run(&request, &backend).unwrap();
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.log.len(), 8);

    let runs = list_runs(&path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].backend, "embedded-rti");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn n_sim_override_changes_run_id() {
    let path = scenario_in("rsm_app_run_override", 4);
    let backend = EmbeddedRti::default();
    let a = ensure_run(
        &RunRequest {
            scenario_path: &path,
            options: RunOptions::default(),
        },
        &backend,
    )
    .unwrap();
    let b = ensure_run(
        &RunRequest {
            scenario_path: &path,
            options: RunOptions {
                n_sim: Some(2),
                ..RunOptions::default()
            },
        },
        &backend,
    )
    .unwrap();
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(b.log.len(), 2);
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn no_store_leaves_nothing_behind() {
    let path = scenario_in("rsm_app_run_nostore", 2);
    let response = ensure_run(
        &RunRequest {
            scenario_path: &path,
            options: RunOptions {
                use_cache: false,
                store: false,
                n_sim: None,
            },
        },
        &EmbeddedRti::default(),
    )
    .unwrap();
    assert_eq!(response.log.len(), 2);
    assert!(!path.parent().unwrap().join(".rsm").exists());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn cache_lookup_without_store_creates_no_directory() {
    let path = scenario_in("rsm_app_run_cache_nostore", 2);
    let options = RunOptions {
        use_cache: true,
        store: false,
        n_sim: None,
    };
    let first = ensure_run(
        &RunRequest {
            scenario_path: &path,
            options: options.clone(),
        },
        &EmbeddedRti::default(),
    )
    .unwrap();
    assert!(!first.loaded_from_cache);
    assert!(!path.parent().unwrap().join(".rsm").exists());
    assert!(list_runs(&path).unwrap().is_empty());
    assert!(!path.parent().unwrap().join(".rsm").exists());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn export_by_prefix_writes_csv() {
    let path = scenario_in("rsm_app_run_export", 3);
    let response = ensure_run(
        &RunRequest {
            scenario_path: &path,
            options: RunOptions::default(),
        },
        &EmbeddedRti::default(),
    )
    .unwrap();

    let out = path.parent().unwrap().join("traj.csv");
    export_run(&path, &response.run_id[..10], Some(&out)).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.starts_with("t,psi_d,psi_q,u_d,u_q"));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn missing_scenario_file_is_reported() {
    let r = load_scenario(std::path::Path::new("/nonexistent/rsm/scenario.yaml"));
    assert!(matches!(r, Err(AppError::ScenarioFileRead { .. })));
}
