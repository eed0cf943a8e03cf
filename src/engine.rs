//! The phase controller: sequences ping → download → upload → done and
//! aggregates the final result.
//!
//! One run at a time; the controller exclusively owns the live sample
//! sequence and current phase while a run is active. Failed runs return
//! the machine to idle, discard the partial sample sequence, and persist
//! nothing.

use crate::config::EngineConfig;
use crate::errors::TestFailure;
use crate::fallback::FallbackEstimator;
use crate::history::HistoryStore;
use crate::probe::{HttpProbe, TransferProbe};
use crate::progress::{
    Direction, EngineStatus, ProgressEvent, SpeedSample, TestPhase,
};
use crate::results::{Aggregator, TestResult};
use crate::retry::{retry_async, RetryResult};
use crate::sampler::Sampler;
use crate::servers::ServerTarget;
use crate::stats;
use crate::transfer;
use log::{info, warn};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Outcome of the latency phase.
struct PingOutcome {
    value_ms: u64,
    reachable: bool,
}

/// Outcome of one transfer direction, after any fallback.
struct DirectionOutcome {
    mbps: f64,
    reachable: bool,
}

/// The measurement engine.
///
/// Generic over its probe so tests can substitute a scripted transport;
/// production code uses the [`HttpProbe`] default.
pub struct SpeedTest<P = HttpProbe> {
    config: EngineConfig,
    probe: P,
    store: HistoryStore,
    state: Mutex<EngineStatus>,
    events: Mutex<Option<mpsc::Sender<ProgressEvent>>>,
    run_lock: tokio::sync::Mutex<()>,
    cancel: watch::Sender<bool>,
}

impl SpeedTest<HttpProbe> {
    /// Engine with the production HTTP probe.
    pub fn new(
        config: EngineConfig,
        store: HistoryStore,
    ) -> Result<Self, TestFailure> {
        let probe = HttpProbe::new().map_err(|err| {
            TestFailure::network("failed to build HTTP client")
                .with_source(err)
        })?;

        Ok(Self::with_probe(config, probe, store))
    }
}

impl<P: TransferProbe> SpeedTest<P> {
    /// Engine with a custom probe implementation.
    pub fn with_probe(
        config: EngineConfig,
        probe: P,
        store: HistoryStore,
    ) -> Self {
        let (cancel, _) = watch::channel(false);

        Self {
            config,
            probe,
            store,
            state: Mutex::new(EngineStatus::default()),
            events: Mutex::new(None),
            run_lock: tokio::sync::Mutex::new(()),
            cancel,
        }
    }

    /// The engine's persisted history.
    pub fn history(&self) -> &HistoryStore {
        &self.store
    }

    /// Snapshot of the current engine state for polled consumers.
    pub fn status(&self) -> EngineStatus {
        self.state.lock().unwrap().clone()
    }

    /// Subscribe to pushed progress events, replacing any previous
    /// subscriber.
    ///
    /// Events are dropped rather than awaited when the receiver lags, so
    /// a slow consumer cannot stall sampling.
    pub fn subscribe(&self) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(256);
        *self.events.lock().unwrap() = Some(tx);
        rx
    }

    /// Request that the active run stop and return to idle.
    ///
    /// Cancels the active phase's tick timer and in-flight requests; a
    /// no-op when no run is active.
    pub fn abort(&self) {
        self.cancel.send_replace(true);
    }

    /// Run one complete test: ping, download, upload.
    ///
    /// Not reentrant: a second invocation while a run is active is
    /// rejected. On success the result is persisted to history and
    /// returned; on failure the engine returns to idle with the error
    /// exposed through [`status`] and nothing persisted.
    ///
    /// [`status`]: SpeedTest::status
    pub async fn run_test(&self) -> Result<TestResult, TestFailure> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| TestFailure::busy("a test run is already active"))?;

        self.cancel.send_replace(false);
        let mut cancel_rx = self.cancel.subscribe();

        let outcome = tokio::select! {
            outcome = self.run_phases() => outcome,
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                Err(TestFailure::aborted("test aborted before completion"))
            }
        };

        match outcome {
            Ok(result) => {
                self.finish_success(&result);
                Ok(result)
            }
            Err(failure) => {
                self.finish_failure(&failure);
                Err(failure)
            }
        }
    }

    async fn run_phases(&self) -> Result<TestResult, TestFailure> {
        let run_start = Instant::now();
        self.begin_run();

        let target =
            self.config.servers.first().cloned().ok_or_else(|| {
                TestFailure::server_resolution(
                    "no measurement targets configured",
                )
            })?;

        info!("measuring against {} ({})", target.name, target.host);

        let ping = self.measure_ping(&target).await;

        self.set_phase(TestPhase::Download);
        let download =
            self.run_direction(&target, Direction::Download, run_start).await;

        self.set_phase(TestPhase::Upload);
        let upload =
            self.run_direction(&target, Direction::Upload, run_start).await;

        let mut ping_ms = Some(ping.value_ms);

        if !ping.reachable && !download.reachable && !upload.reachable {
            // Nothing has reached the network so far; one trivial fetch
            // decides whether any surface is reachable at all.
            let estimator = FallbackEstimator::new(&self.probe, &self.config);
            match estimator.latency(&target).await {
                Some(ms) => ping_ms = Some(ms),
                None if download.mbps > 0.0 || upload.mbps > 0.0 => {
                    ping_ms = None;
                }
                None => {
                    return Err(TestFailure::network(
                        "unable to reach any measurement endpoint",
                    ));
                }
            }
        }

        let result = Aggregator::new(&self.store).commit(
            download.mbps,
            upload.mbps,
            ping_ms,
        );

        info!(
            "run complete: {:.2} Mbps down, {:.2} Mbps up, ping {:?} ms",
            result.download_mbps, result.upload_mbps, result.ping_ms
        );

        Ok(result)
    }

    /// Measure latency as the rounded mean of the configured number of
    /// near-zero-payload round trips.
    ///
    /// A round trip that fails after its retries substitutes the fixed
    /// fallback constant for the whole measurement instead of failing
    /// the run.
    async fn measure_ping(&self, target: &ServerTarget) -> PingOutcome {
        let mut rounds = Vec::with_capacity(self.config.ping_rounds);

        for round in 0..self.config.ping_rounds {
            let operation = format!(
                "latency round trip {}/{}",
                round + 1,
                self.config.ping_rounds
            );

            let result = retry_async(&self.config.retry, &operation, || {
                self.probe.ping(target, self.config.ping_timeout)
            })
            .await;

            match result {
                RetryResult::Success(rtt) => {
                    let value_ms =
                        (rtt.as_secs_f64() * 1000.0).round() as u64;
                    self.emit(ProgressEvent::PingMeasurement {
                        value_ms,
                        round: round + 1,
                        total: self.config.ping_rounds,
                    });
                    rounds.push(rtt);
                }
                RetryResult::Failed { last_error, attempts } => {
                    warn!(
                        "{} failed after {} attempts: {}; substituting {} ms",
                        operation,
                        attempts,
                        last_error,
                        self.config.ping_fallback_ms
                    );

                    return PingOutcome {
                        value_ms: self.config.ping_fallback_ms,
                        reachable: !rounds.is_empty(),
                    };
                }
            }
        }

        PingOutcome {
            value_ms: stats::rounded_mean_ms(&rounds),
            reachable: true,
        }
    }

    /// Drive one transfer direction, routing a zero-signal phase through
    /// the fallback estimator.
    async fn run_direction(
        &self,
        target: &ServerTarget,
        direction: Direction,
        run_start: Instant,
    ) -> DirectionOutcome {
        let jitter_range = match direction {
            Direction::Download => self.config.download_jitter,
            Direction::Upload => self.config.upload_jitter,
        };

        let mut sampler = Sampler::new(
            self.config.jitter_mode.source(),
            jitter_range,
            self.config.min_sample_mbps,
        );

        let outcome = transfer::run_transfer_phase(
            &self.probe,
            target,
            direction,
            &self.config,
            &mut sampler,
            run_start,
            |sample| self.publish_sample(sample),
        )
        .await;

        if outcome.bytes == 0 {
            info!(
                "{} phase produced no signal; invoking fallback estimator",
                direction
            );
            let estimate = FallbackEstimator::new(&self.probe, &self.config)
                .estimate(target, direction)
                .await;

            return DirectionOutcome {
                mbps: estimate.mbps,
                reachable: estimate.reachable,
            };
        }

        let mbps = outcome.cumulative_mbps();
        info!("{} phase: {:.2} Mbps cumulative average", direction, mbps);

        DirectionOutcome { mbps, reachable: true }
    }

    fn begin_run(&self) {
        {
            let mut state = self.state.lock().unwrap();
            *state = EngineStatus {
                phase: TestPhase::Ping,
                ..EngineStatus::default()
            };
        }
        self.emit(ProgressEvent::PhaseChange(TestPhase::Ping));
    }

    fn set_phase(&self, phase: TestPhase) {
        self.state.lock().unwrap().phase = phase;
        self.emit(ProgressEvent::PhaseChange(phase));
    }

    fn publish_sample(&self, sample: SpeedSample) {
        {
            let mut state = self.state.lock().unwrap();
            state.current_speed_mbps = sample.mbps();
            state.samples.push(sample);
        }
        self.emit(ProgressEvent::Sample(sample));
    }

    fn finish_success(&self, result: &TestResult) {
        {
            let mut state = self.state.lock().unwrap();
            state.phase = TestPhase::Done;
            state.current_speed_mbps = 0.0;
            state.result = Some(result.clone());
        }
        self.emit(ProgressEvent::PhaseChange(TestPhase::Done));
        self.emit(ProgressEvent::Complete(result.clone()));
    }

    fn finish_failure(&self, failure: &TestFailure) {
        let message = failure.to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.phase = TestPhase::Idle;
            state.current_speed_mbps = 0.0;
            // The partial sample sequence is discarded with the run.
            state.samples.clear();
            state.error = Some(message.clone());
        }
        self.emit(ProgressEvent::Error(message));
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.try_send(event);
        }
    }
}
