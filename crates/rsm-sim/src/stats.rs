//! Solve-time bookkeeping against the sampling period.

use serde::Serialize;

/// Wall time of every solve in a run.
#[derive(Clone, Debug)]
pub struct StepStats {
    ts: f64,
    solve_times: Vec<f64>,
}

/// Aggregate of [`StepStats`], reported after a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsSummary {
    pub steps: usize,
    pub mean_s: f64,
    pub max_s: f64,
    /// Solves that took longer than one sampling period.
    pub overruns: usize,
    pub ts: f64,
}

impl StepStats {
    pub fn new(ts: f64) -> Self {
        Self {
            ts,
            solve_times: Vec::new(),
        }
    }

    /// Record one solve; returns true if it overran the sampling period.
    pub fn record(&mut self, seconds: f64) -> bool {
        self.solve_times.push(seconds);
        seconds > self.ts
    }

    pub fn count(&self) -> usize {
        self.solve_times.len()
    }

    pub fn solve_times(&self) -> &[f64] {
        &self.solve_times
    }

    pub fn mean_s(&self) -> f64 {
        if self.solve_times.is_empty() {
            return 0.0;
        }
        self.solve_times.iter().sum::<f64>() / self.solve_times.len() as f64
    }

    pub fn max_s(&self) -> f64 {
        self.solve_times.iter().copied().fold(0.0, f64::max)
    }

    pub fn overruns(&self) -> usize {
        self.solve_times.iter().filter(|&&t| t > self.ts).count()
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            steps: self.count(),
            mean_s: self.mean_s(),
            max_s: self.max_s(),
            overruns: self.overruns(),
            ts: self.ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_are_zero() {
        let s = StepStats::new(0.0008);
        assert_eq!(s.mean_s(), 0.0);
        assert_eq!(s.max_s(), 0.0);
        assert_eq!(s.overruns(), 0);
    }

    #[test]
    fn overruns_counted_against_ts() {
        let mut s = StepStats::new(1e-3);
        assert!(!s.record(2e-4));
        assert!(s.record(3e-3));
        assert!(!s.record(1e-3));
        let sum = s.summary();
        assert_eq!(sum.steps, 3);
        assert_eq!(sum.overruns, 1);
        assert_eq!(sum.max_s, 3e-3);
        assert!((sum.mean_s - 4.2e-3 / 3.0).abs() < 1e-15);
    }
}
