//! Append-only trajectory record.

use serde::{Deserialize, Serialize};

/// State and applied control at one sampling instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    pub step: usize,
    /// Time of the sampling instant (s).
    pub t: f64,
    /// Flux linkages `[psi_d, psi_q]` (Wb).
    pub x: Vec<f64>,
    /// Applied voltages `[u_d, u_q]` (V).
    pub u: Vec<f64>,
    /// Wall time of the solve that produced `u` (s).
    pub solve_time_s: f64,
}

/// Chronological `(x_0, u_0)` pairs of a run. Entries are only appended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryLog {
    entries: Vec<TrajectoryEntry>,
}

impl TrajectoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    /// Append the next sampling instant; its index is the current length.
    pub fn push(&mut self, t: f64, x: Vec<f64>, u: Vec<f64>, solve_time_s: f64) {
        let step = self.entries.len();
        self.entries.push(TrajectoryEntry {
            step,
            t,
            x,
            u,
            solve_time_s,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TrajectoryEntry> {
        self.entries.last()
    }

    pub fn states(&self) -> impl Iterator<Item = &[f64]> {
        self.entries.iter().map(|e| e.x.as_slice())
    }

    pub fn controls(&self) -> impl Iterator<Item = &[f64]> {
        self.entries.iter().map(|e| e.u.as_slice())
    }
}

impl From<Vec<TrajectoryEntry>> for TrajectoryLog {
    fn from(entries: Vec<TrajectoryEntry>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for TrajectoryLog {
    type Item = TrajectoryEntry;
    type IntoIter = std::vec::IntoIter<TrajectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
