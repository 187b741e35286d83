//! CSV export of a trajectory.

use crate::ResultsResult;
use rsm_sim::TrajectoryEntry;
use std::io::Write;

pub const CSV_HEADER: &str = "t,psi_d,psi_q,u_d,u_q";

/// One row per sampling instant: time, flux linkages, applied voltages.
pub fn write_csv<W: Write>(entries: &[TrajectoryEntry], mut out: W) -> ResultsResult<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for e in entries {
        let x = |i: usize| e.x.get(i).copied().unwrap_or(f64::NAN);
        let u = |i: usize| e.u.get(i).copied().unwrap_or(f64::NAN);
        writeln!(out, "{},{},{},{},{}", e.t, x(0), x(1), u(0), u(1))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_sim::TrajectoryLog;

    #[test]
    fn writes_header_and_rows() {
        let mut log = TrajectoryLog::new();
        log.push(0.0, vec![0.0, 0.0], vec![100.0, 250.0], 1e-4);
        log.push(0.0008, vec![0.05, 0.08], vec![90.5, 240.0], 1e-4);
        let mut buf = Vec::new();
        write_csv(log.entries(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "0,0,0,100,250");
        assert_eq!(lines[2], "0.0008,0.05,0.08,90.5,240");
    }
}
