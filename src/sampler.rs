//! Windowed throughput sampling.
//!
//! Converts the byte delta of one tick into a jittered Mbps estimate. The
//! jitter emulates the natural variance of a live connection so a steady
//! transfer does not render as a perfectly flat line, and is drawn from a
//! pluggable source so deterministic tests can pin it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Bits per Mbps unit on the 2^20 scale.
const MEGABIT: f64 = 1024.0 * 1024.0;

/// Source of the multiplicative jitter factor applied to each sample.
pub trait JitterSource: Send {
    /// Draw a factor uniformly from `range` (inclusive on both ends).
    fn factor(&mut self, range: (f64, f64)) -> f64;
}

/// Entropy- or seed-backed jitter for live runs.
#[derive(Debug)]
pub struct RandomJitter(StdRng);

impl RandomJitter {
    /// Entropy-seeded jitter.
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Seeded jitter for reproducible series.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn factor(&mut self, range: (f64, f64)) -> f64 {
        self.0.gen_range(range.0..=range.1)
    }
}

/// A fixed jitter factor; `FixedJitter(1.0)` disables jitter entirely.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn factor(&mut self, _range: (f64, f64)) -> f64 {
        self.0
    }
}

/// How the engine constructs the jitter source for each transfer phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitterMode {
    /// Entropy-seeded randomness.
    Entropy,
    /// Deterministic seeded randomness.
    Seeded(u64),
    /// A fixed factor; `Fixed(1.0)` disables jitter.
    Fixed(f64),
}

impl Default for JitterMode {
    fn default() -> Self {
        JitterMode::Entropy
    }
}

impl JitterMode {
    pub(crate) fn source(&self) -> Box<dyn JitterSource> {
        match self {
            JitterMode::Entropy => Box::new(RandomJitter::new()),
            JitterMode::Seeded(seed) => Box::new(RandomJitter::seeded(*seed)),
            JitterMode::Fixed(factor) => Box::new(FixedJitter(*factor)),
        }
    }
}

/// Raw throughput for one tick: `bytes * 8 / interval / 2^20`, in Mbps.
pub fn raw_mbps(bytes: u64, interval: Duration) -> f64 {
    let secs = interval.as_secs_f64();

    if secs <= 0.0 {
        return 0.0;
    }

    (bytes as f64 * 8.0) / secs / MEGABIT
}

/// Per-phase throughput sampler.
///
/// Stateless apart from its randomness source: each call to [`sample`]
/// depends only on the tick's byte delta and interval.
///
/// [`sample`]: Sampler::sample
pub struct Sampler {
    jitter: Box<dyn JitterSource>,
    jitter_range: (f64, f64),
    min_mbps: f64,
}

impl Sampler {
    /// Create a sampler drawing its jitter factor from `jitter` within
    /// `jitter_range`, suppressing samples below `min_mbps`.
    pub fn new(
        jitter: Box<dyn JitterSource>,
        jitter_range: (f64, f64),
        min_mbps: f64,
    ) -> Self {
        Self { jitter, jitter_range, min_mbps }
    }

    /// Compute the jittered Mbps estimate for one tick.
    ///
    /// Returns `None` when the jittered value falls below the significance
    /// threshold, which keeps pre-connection-establishment noise out of
    /// the sample series. The threshold is applied after jitter, so a
    /// tick is judged on the value that would be displayed.
    pub fn sample(&mut self, bytes: u64, interval: Duration) -> Option<f64> {
        let raw = raw_mbps(bytes, interval);

        if raw <= 0.0 {
            return None;
        }

        let jittered = raw * self.jitter.factor(self.jitter_range);

        if jittered < self.min_mbps {
            None
        } else {
            Some(jittered)
        }
    }
}
