//! Engine progress surface: phases, samples, and the events pushed to
//! consumers during a run.

use crate::results::TestResult;
use std::fmt;

/// Discrete stage of one test run.
///
/// Exactly one phase is active per run. `Idle` is both the initial state
/// and the terminal state after a failed run; `Done` is the terminal state
/// of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPhase {
    /// No run active.
    #[default]
    Idle,
    /// Resolving targets and measuring latency.
    Ping,
    /// Measuring download throughput.
    Download,
    /// Measuring upload throughput.
    Upload,
    /// Run finished successfully.
    Done,
}

/// Which direction a transfer phase measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// One timestamped throughput observation from an active transfer phase.
///
/// Immutable once emitted; samples within a run are strictly ordered by
/// `time_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    /// Milliseconds since the run started (monotonic tag).
    pub time_ms: u64,
    /// Download throughput in Mbps; zero during upload ticks.
    pub download_mbps: f64,
    /// Upload throughput in Mbps; zero during download ticks.
    pub upload_mbps: f64,
}

impl SpeedSample {
    pub(crate) fn for_direction(
        time_ms: u64,
        direction: Direction,
        mbps: f64,
    ) -> Self {
        match direction {
            Direction::Download => {
                Self { time_ms, download_mbps: mbps, upload_mbps: 0.0 }
            }
            Direction::Upload => {
                Self { time_ms, download_mbps: 0.0, upload_mbps: mbps }
            }
        }
    }

    /// The non-zero side of the sample.
    pub fn mbps(&self) -> f64 {
        self.download_mbps.max(self.upload_mbps)
    }
}

/// Progress events pushed to subscribed consumers during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Test phase has changed.
    PhaseChange(TestPhase),
    /// Latency round trip completed.
    PingMeasurement {
        /// Measured round-trip time in milliseconds.
        value_ms: u64,
        /// Current round number (1-indexed).
        round: usize,
        /// Total number of rounds.
        total: usize,
    },
    /// A throughput sample was emitted.
    Sample(SpeedSample),
    /// Run completed with a final result.
    Complete(TestResult),
    /// Run failed.
    Error(String),
}

/// Snapshot of the engine state for polled consumers.
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    /// Current test phase.
    pub phase: TestPhase,
    /// Most recent jittered sample value in Mbps.
    pub current_speed_mbps: f64,
    /// Samples emitted so far in the active run, in emission order.
    pub samples: Vec<SpeedSample>,
    /// Final result of the last completed run.
    pub result: Option<TestResult>,
    /// Message of the last failed run.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase_is_idle() {
        assert_eq!(EngineStatus::default().phase, TestPhase::Idle);
    }

    #[test]
    fn test_sample_for_download() {
        let sample = SpeedSample::for_direction(120, Direction::Download, 42.5);
        assert_eq!(sample.time_ms, 120);
        assert_eq!(sample.download_mbps, 42.5);
        assert_eq!(sample.upload_mbps, 0.0);
        assert_eq!(sample.mbps(), 42.5);
    }

    #[test]
    fn test_sample_for_upload() {
        let sample = SpeedSample::for_direction(340, Direction::Upload, 11.0);
        assert_eq!(sample.download_mbps, 0.0);
        assert_eq!(sample.upload_mbps, 11.0);
        assert_eq!(sample.mbps(), 11.0);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Download.to_string(), "download");
        assert_eq!(Direction::Upload.to_string(), "upload");
    }
}
