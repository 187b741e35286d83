//! Return codes of an RTI solve.

use serde::{Serialize, Serializer};
use std::fmt;

/// Status reported by `solve`; only [`SolveStatus::Success`] passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Success,
    NanDetected,
    MaxIterations,
    MinStep,
    QpFailure,
    Ready,
    Unbounded,
    Timeout,
    Unknown(i32),
}

impl SolveStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => SolveStatus::Success,
            1 => SolveStatus::NanDetected,
            2 => SolveStatus::MaxIterations,
            3 => SolveStatus::MinStep,
            4 => SolveStatus::QpFailure,
            5 => SolveStatus::Ready,
            6 => SolveStatus::Unbounded,
            7 => SolveStatus::Timeout,
            other => SolveStatus::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SolveStatus::Success => 0,
            SolveStatus::NanDetected => 1,
            SolveStatus::MaxIterations => 2,
            SolveStatus::MinStep => 3,
            SolveStatus::QpFailure => 4,
            SolveStatus::Ready => 5,
            SolveStatus::Unbounded => 6,
            SolveStatus::Timeout => 7,
            SolveStatus::Unknown(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == SolveStatus::Success
    }
}

impl From<i32> for SolveStatus {
    fn from(code: i32) -> Self {
        SolveStatus::from_code(code)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Success => write!(f, "success"),
            SolveStatus::NanDetected => write!(f, "NaN detected"),
            SolveStatus::MaxIterations => write!(f, "maximum iterations reached"),
            SolveStatus::MinStep => write!(f, "minimum step size reached"),
            SolveStatus::QpFailure => write!(f, "QP solver failed"),
            SolveStatus::Ready => write!(f, "ready (not solved)"),
            SolveStatus::Unbounded => write!(f, "problem unbounded"),
            SolveStatus::Timeout => write!(f, "timeout"),
            SolveStatus::Unknown(code) => write!(f, "unknown status {code}"),
        }
    }
}

impl Serialize for SolveStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}
