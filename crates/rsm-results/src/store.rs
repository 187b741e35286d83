//! Run storage API.

use crate::export::write_csv;
use crate::types::RunManifest;
use crate::{ResultsError, ResultsResult};
use rsm_sim::{TrajectoryEntry, TrajectoryLog};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const MANIFEST: &str = "manifest.json";
const TRAJECTORY: &str = "trajectory.jsonl";

fn runs_dir(scenario_path: &Path) -> ResultsResult<PathBuf> {
    let dir = scenario_path
        .parent()
        .ok_or_else(|| ResultsError::InvalidPath {
            message: "scenario path has no parent directory".to_string(),
        })?;
    Ok(dir.join(".rsm").join("runs"))
}

#[derive(Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store next to a scenario file, under `.rsm/runs`.
    pub fn for_scenario(scenario_path: &Path) -> ResultsResult<Self> {
        Self::new(runs_dir(scenario_path)?)
    }

    /// Like [`RunStore::for_scenario`] but never creates the directory.
    pub fn existing_for_scenario(scenario_path: &Path) -> ResultsResult<Option<Self>> {
        let root_dir = runs_dir(scenario_path)?;
        Ok(root_dir.is_dir().then_some(Self { root_dir }))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    pub fn save_run(&self, manifest: &RunManifest, log: &TrajectoryLog) -> ResultsResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(run_dir.join(MANIFEST), manifest_json)?;

        let mut content = String::new();
        for entry in log.entries() {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }
        fs::write(run_dir.join(TRAJECTORY), content)?;

        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id).join(MANIFEST);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_trajectory(&self, run_id: &str) -> ResultsResult<TrajectoryLog> {
        let path = self.run_dir(run_id).join(TRAJECTORY);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                let entry: TrajectoryEntry = serde_json::from_str(line)?;
                entries.push(entry);
            }
        }
        Ok(TrajectoryLog::from(entries))
    }

    /// All stored runs, oldest first.
    pub fn list_runs(&self) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();
        if !self.root_dir.exists() {
            return Ok(runs);
        }
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }
        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(runs)
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve(&self, prefix: &str) -> ResultsResult<String> {
        if self.has_run(prefix) {
            return Ok(prefix.to_string());
        }
        let mut matches = self
            .list_runs()?
            .into_iter()
            .filter(|m| m.run_id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(m), None) if !prefix.is_empty() => Ok(m.run_id),
            _ => Err(ResultsError::RunNotFound {
                run_id: prefix.to_string(),
            }),
        }
    }

    pub fn export_csv(&self, run_id: &str, path: &Path) -> ResultsResult<()> {
        let log = self.load_trajectory(run_id)?;
        let file = fs::File::create(path)?;
        write_csv(log.entries(), BufWriter::new(file))
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}
