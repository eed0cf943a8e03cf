//! Degraded-mode estimation for phases that yield no usable signal.
//!
//! Every path here is non-fatal: the worst outcome is a zero-valued
//! estimate, never a propagated failure.

use crate::config::EngineConfig;
use crate::probe::{ByteCounter, ProbeError, TransferProbe};
use crate::progress::Direction;
use crate::servers::ServerTarget;
use crate::stats;
use crate::transfer;
use log::{info, warn};
use tokio::time::Instant;

/// A degraded throughput estimate.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FallbackEstimate {
    /// Estimated throughput in Mbps; zero when nothing could be measured.
    pub mbps: f64,
    /// Whether bytes actually moved, as opposed to a passive hint or
    /// giving up entirely.
    pub reachable: bool,
}

/// Degraded-mode estimator, driven once per zero-signal phase.
pub(crate) struct FallbackEstimator<'a, P> {
    probe: &'a P,
    config: &'a EngineConfig,
}

impl<'a, P: TransferProbe> FallbackEstimator<'a, P> {
    pub fn new(probe: &'a P, config: &'a EngineConfig) -> Self {
        Self { probe, config }
    }

    /// Estimate throughput for `direction` with one smaller single-shot
    /// transfer, degrading to the passive hint when that also fails.
    pub async fn estimate(
        &self,
        target: &ServerTarget,
        direction: Direction,
    ) -> FallbackEstimate {
        match self.single_shot(target, direction).await {
            Ok(mbps) => {
                info!("single-shot {} fallback: {:.2} Mbps", direction, mbps);
                FallbackEstimate { mbps, reachable: true }
            }
            Err(err) => {
                warn!("single-shot {} fallback failed: {}", direction, err);
                FallbackEstimate {
                    mbps: self.passive(direction),
                    reachable: false,
                }
            }
        }
    }

    /// One fixed-size transfer with no live sampling; Mbps from total
    /// bytes over wall-clock duration.
    async fn single_shot(
        &self,
        target: &ServerTarget,
        direction: Direction,
    ) -> Result<f64, ProbeError> {
        let counter = ByteCounter::new();
        let started = Instant::now();
        let deadline = started + self.config.fallback_timeout;

        let request = async {
            match direction {
                Direction::Download => {
                    self.probe
                        .download(
                            target,
                            self.config.fallback_download_bytes,
                            &counter,
                            deadline,
                        )
                        .await
                }
                Direction::Upload => {
                    let payload = transfer::upload_payload(
                        self.config.fallback_upload_bytes,
                    );
                    self.probe.upload(target, &payload, &counter).await
                }
            }
        };

        let bytes = tokio::time::timeout(self.config.fallback_timeout, request)
            .await
            .map_err(|_| {
                ProbeError::new(format!(
                    "single-shot {} timed out",
                    direction
                ))
            })??;

        if bytes == 0 {
            return Err(ProbeError::new("single-shot transfer moved no bytes"));
        }

        Ok(stats::cumulative_mbps(bytes, started.elapsed()))
    }

    /// Passive estimate from the host-supplied connection-quality hint:
    /// download is the hint itself, upload a fixed fraction of it.
    fn passive(&self, direction: Direction) -> f64 {
        match self.config.connection_hint_mbps {
            Some(hint) => match direction {
                Direction::Download => hint,
                Direction::Upload => {
                    hint * self.config.passive_upload_fraction
                }
            },
            None => 0.0,
        }
    }

    /// Latency fallback: one trivial fetch with a bounded timeout.
    ///
    /// Returns `None` when the fetch does not resolve in time.
    pub async fn latency(&self, target: &ServerTarget) -> Option<u64> {
        match self
            .probe
            .ping(target, self.config.fallback_ping_timeout)
            .await
        {
            Ok(rtt) => Some((rtt.as_secs_f64() * 1000.0).round() as u64),
            Err(err) => {
                warn!("latency fallback failed: {}", err);
                None
            }
        }
    }
}
