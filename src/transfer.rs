//! One transfer phase: sequential chunks against a target for a fixed
//! wall-clock budget, sampled on a fixed tick cadence.
//!
//! Ticks and chunk completions are merged into a single task, so sample
//! emission is serialized and no two samples are computed from
//! overlapping byte deltas. At the deadline the in-flight chunk is
//! dropped, not awaited.

use crate::config::EngineConfig;
use crate::probe::{ByteCounter, TransferProbe};
use crate::progress::{Direction, SpeedSample};
use crate::sampler::Sampler;
use crate::servers::ServerTarget;
use crate::stats;
use log::{debug, warn};
use rand::RngCore;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Pause after a failed chunk so a dead link does not busy-loop away the
/// remainder of the budget.
const CHUNK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Totals for one completed transfer phase.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PhaseOutcome {
    /// Cumulative bytes moved across all chunks.
    pub bytes: u64,
    /// Wall-clock time spent in the phase.
    pub elapsed: Duration,
}

impl PhaseOutcome {
    /// Cumulative-average throughput for the phase.
    ///
    /// This, not the last live sample, is the phase's contribution to the
    /// final result.
    pub fn cumulative_mbps(&self) -> f64 {
        stats::cumulative_mbps(self.bytes, self.elapsed)
    }
}

/// Opaque payload for upload chunks; the endpoint ignores its contents.
pub(crate) fn upload_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}

/// Drive one direction of byte exchange for the configured budget,
/// feeding each tick's byte delta through `sampler` and publishing the
/// surviving samples via `emit`.
pub(crate) async fn run_transfer_phase<P, F>(
    probe: &P,
    target: &ServerTarget,
    direction: Direction,
    config: &EngineConfig,
    sampler: &mut Sampler,
    run_start: Instant,
    mut emit: F,
) -> PhaseOutcome
where
    P: TransferProbe,
    F: FnMut(SpeedSample),
{
    let counter = ByteCounter::new();
    let started = Instant::now();
    let deadline = started + config.phase_duration;

    let payload = match direction {
        Direction::Upload => upload_payload(config.upload_chunk_bytes),
        Direction::Download => Vec::new(),
    };

    let transfer = async {
        loop {
            let result = match direction {
                Direction::Download => {
                    probe
                        .download(
                            target,
                            config.download_chunk_bytes,
                            &counter,
                            deadline,
                        )
                        .await
                }
                Direction::Upload => {
                    probe.upload(target, &payload, &counter).await
                }
            };

            if let Err(err) = result {
                warn!("{} chunk failed: {}", direction, err);
                time::sleep(CHUNK_RETRY_DELAY).await;
            }

            if Instant::now() >= deadline {
                break;
            }
        }
    };
    tokio::pin!(transfer);

    let mut ticker = time::interval_at(
        started + config.tick_interval,
        config.tick_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_total = 0u64;
    let mut last_tick = started;

    loop {
        tokio::select! {
            _ = &mut transfer => break,
            _ = time::sleep_until(deadline) => break,
            now = ticker.tick() => {
                if now >= deadline {
                    break;
                }

                let total = counter.get();
                let delta = total - last_total;
                let interval = now.duration_since(last_tick);
                last_total = total;
                last_tick = now;

                if let Some(mbps) = sampler.sample(delta, interval) {
                    let elapsed_ms = run_start.elapsed().as_millis() as u64;
                    emit(SpeedSample::for_direction(
                        elapsed_ms, direction, mbps,
                    ));
                }
            }
        }
    }

    let outcome =
        PhaseOutcome { bytes: counter.get(), elapsed: started.elapsed() };

    debug!(
        "{} phase moved {} bytes in {:?} ({:.2} Mbps cumulative)",
        direction,
        outcome.bytes,
        outcome.elapsed,
        outcome.cumulative_mbps()
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::ScriptedProbe;
    use crate::sampler::FixedJitter;

    fn test_config() -> EngineConfig {
        EngineConfig {
            phase_duration: Duration::from_millis(400),
            tick_interval: Duration::from_millis(100),
            download_chunk_bytes: 10_000_000,
            upload_chunk_bytes: 10_000,
            ..EngineConfig::default()
        }
    }

    fn test_sampler() -> Sampler {
        Sampler::new(Box::new(FixedJitter(1.0)), (1.0, 1.0), 0.0)
    }

    fn target() -> ServerTarget {
        ServerTarget::new("test.invalid", "Test")
    }

    #[test]
    fn test_upload_payload_length() {
        assert_eq!(upload_payload(1024).len(), 1024);
    }

    #[tokio::test]
    async fn test_download_phase_samples_and_respects_budget() {
        let probe = ScriptedProbe::steady(50_000, 20);
        let config = test_config();
        let mut sampler = test_sampler();
        let mut samples = Vec::new();

        let outcome = run_transfer_phase(
            &probe,
            &target(),
            Direction::Download,
            &config,
            &mut sampler,
            Instant::now(),
            |sample| samples.push(sample),
        )
        .await;

        assert!(outcome.bytes > 0);
        assert!(outcome.elapsed >= config.phase_duration);
        assert!(outcome.elapsed < config.phase_duration * 2);
        assert!(outcome.cumulative_mbps() > 0.0);

        assert!(!samples.is_empty());
        for sample in &samples {
            assert!(sample.download_mbps > 0.0);
            assert_eq!(sample.upload_mbps, 0.0);
        }

        // Monotonic tags within the phase.
        for pair in samples.windows(2) {
            assert!(pair[0].time_ms < pair[1].time_ms);
        }
    }

    #[tokio::test]
    async fn test_upload_phase_credits_chunks() {
        let probe = ScriptedProbe::steady(50_000, 20);
        let config = test_config();
        let mut sampler = test_sampler();
        let mut samples = Vec::new();

        let outcome = run_transfer_phase(
            &probe,
            &target(),
            Direction::Upload,
            &config,
            &mut sampler,
            Instant::now(),
            |sample| samples.push(sample),
        )
        .await;

        assert!(outcome.bytes > 0);
        // Every credited chunk carried the configured payload size.
        assert_eq!(outcome.bytes % config.upload_chunk_bytes as u64, 0);

        let lens = probe.upload_lens.lock().unwrap();
        assert!(lens.iter().all(|len| *len == config.upload_chunk_bytes));

        for sample in &samples {
            assert_eq!(sample.download_mbps, 0.0);
        }
    }

    #[tokio::test]
    async fn test_dead_transfer_reports_zero_signal() {
        let probe = ScriptedProbe::dead();
        let config = test_config();
        let mut sampler = test_sampler();
        let mut samples = Vec::new();

        let outcome = run_transfer_phase(
            &probe,
            &target(),
            Direction::Download,
            &config,
            &mut sampler,
            Instant::now(),
            |sample| samples.push(sample),
        )
        .await;

        assert_eq!(outcome.bytes, 0);
        assert_eq!(outcome.cumulative_mbps(), 0.0);
        assert!(samples.is_empty());
        assert!(outcome.elapsed >= config.phase_duration);
    }

    #[tokio::test]
    async fn test_constant_rate_cumulative_matches_ticks() {
        // 50 KB per 25 ms slice is 2 MB/s; per-tick raw and the phase's
        // cumulative average should agree within scheduling slack.
        let probe = ScriptedProbe::steady(50_000, 20);
        let config = test_config();
        let mut sampler = test_sampler();
        let mut samples = Vec::new();

        let outcome = run_transfer_phase(
            &probe,
            &target(),
            Direction::Download,
            &config,
            &mut sampler,
            Instant::now(),
            |sample| samples.push(sample),
        )
        .await;

        let cumulative = outcome.cumulative_mbps();
        for sample in &samples {
            let ratio = sample.download_mbps / cumulative;
            assert!(
                (0.5..2.0).contains(&ratio),
                "tick {} Mbps vs cumulative {} Mbps",
                sample.download_mbps,
                cumulative
            );
        }
    }
}
