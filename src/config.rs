//! Engine configuration.
//!
//! Every tunable of the measurement methodology is a field here, so
//! nothing about a run's shape is hard-coded into the engine.

use crate::retry::RetryConfig;
use crate::sampler::JitterMode;
use crate::servers::{self, ServerTarget};
use std::time::Duration;

/// Configuration for the measurement engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Candidate measurement targets, closest-by-convention first.
    /// The engine selects the first entry once per run.
    pub servers: Vec<ServerTarget>,

    /// Number of latency round trips per run.
    /// Default: 3
    pub ping_rounds: usize,

    /// Timeout for a single latency round trip.
    /// Default: 5s
    pub ping_timeout: Duration,

    /// Latency substituted when a round trip fails, in milliseconds.
    /// Default: 50
    pub ping_fallback_ms: u64,

    /// Retry behavior for individual latency round trips.
    /// Default: 2 retries with exponential backoff
    pub retry: RetryConfig,

    /// Wall-clock budget for each transfer phase.
    /// Default: 7s
    pub phase_duration: Duration,

    /// Sampling tick cadence during transfer phases.
    /// Default: 1s
    pub tick_interval: Duration,

    /// Bytes requested per download chunk, sized so a single chunk
    /// outlives the phase budget on most links.
    /// Default: 100 MiB
    pub download_chunk_bytes: u64,

    /// Payload size per upload chunk.
    /// Default: 2 MiB
    pub upload_chunk_bytes: usize,

    /// Jitter factor range applied to download ticks.
    /// Default: [0.92, 1.08]
    pub download_jitter: (f64, f64),

    /// Jitter factor range applied to upload ticks.
    /// Default: [0.88, 1.12]
    pub upload_jitter: (f64, f64),

    /// How the per-phase jitter source is constructed.
    /// Default: entropy-seeded
    pub jitter_mode: JitterMode,

    /// Ticks whose jittered value falls below this are suppressed, in
    /// Mbps.
    /// Default: 0.1
    pub min_sample_mbps: f64,

    /// Size of the single-shot fallback download.
    /// Default: 10 MB
    pub fallback_download_bytes: u64,

    /// Payload size of the single-shot fallback upload.
    /// Default: 1 MB
    pub fallback_upload_bytes: usize,

    /// Timeout for a single-shot fallback transfer.
    /// Default: 15s
    pub fallback_timeout: Duration,

    /// Timeout for the trivial latency-fallback fetch.
    /// Default: 3s
    pub fallback_ping_timeout: Duration,

    /// Host-supplied downlink quality hint in Mbps, used by the passive
    /// fallback when no transfer succeeds at all.
    /// Default: none
    pub connection_hint_mbps: Option<f64>,

    /// Upload fraction of the downlink hint in the passive fallback.
    /// Default: 0.4
    pub passive_upload_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            servers: servers::candidates(),
            ping_rounds: 3,
            ping_timeout: Duration::from_secs(5),
            ping_fallback_ms: 50,
            retry: RetryConfig::default(),
            phase_duration: Duration::from_secs(7),
            tick_interval: Duration::from_secs(1),
            download_chunk_bytes: 100 * 1024 * 1024,
            upload_chunk_bytes: 2 * 1024 * 1024,
            download_jitter: (0.92, 1.08),
            upload_jitter: (0.88, 1.12),
            jitter_mode: JitterMode::Entropy,
            min_sample_mbps: 0.1,
            fallback_download_bytes: 10 * 1024 * 1024,
            fallback_upload_bytes: 1024 * 1024,
            fallback_timeout: Duration::from_secs(15),
            fallback_ping_timeout: Duration::from_secs(3),
            connection_hint_mbps: None,
            passive_upload_fraction: 0.4,
        }
    }
}
