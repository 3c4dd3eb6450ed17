//! Per-phase and per-step timings

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::dialect::ActionKind;

/// Wall-clock time spent in each pipeline phase, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseMetrics {
    pub parse_ms: f64,
    pub detect_ms: f64,
    pub validate_ms: f64,
    pub compile_ms: f64,
    pub execute_ms: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepTiming>,
}

impl PhaseMetrics {
    pub fn total_ms(&self) -> f64 {
        self.parse_ms + self.detect_ms + self.validate_ms + self.compile_ms + self.execute_ms
    }
}

/// Outcome and duration of one dispatched step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTiming {
    /// 0-based index in the compiled step list
    pub index: usize,
    pub command: ActionKind,
    /// Position the step was inserted at
    pub position: u32,
    pub duration_ms: f64,
    pub success: bool,
}

/// Run `f` and return its output with the elapsed milliseconds
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let out = f();
    (out, millis(start.elapsed()))
}

pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_phases() {
        let metrics = PhaseMetrics {
            parse_ms: 1.0,
            detect_ms: 2.0,
            validate_ms: 3.0,
            compile_ms: 4.0,
            execute_ms: 5.0,
            steps: Vec::new(),
        };
        assert_eq!(metrics.total_ms(), 15.0);
    }

    #[test]
    fn test_timed_returns_output() {
        let (value, ms) = timed(|| 21 * 2);
        assert_eq!(value, 42);
        assert!(ms >= 0.0);
    }
}
