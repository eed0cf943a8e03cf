//! Network probe layer: the HTTP edge of the measurement engine.
//!
//! The engine talks to targets exclusively through [`TransferProbe`], so
//! tests can substitute scripted probes for the real transport.

pub(crate) mod http;

pub use http::HttpProbe;

use crate::servers::ServerTarget;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Download endpoint path.
pub(crate) static DOWN_ENDPOINT: &str = "__down";

/// Upload endpoint path.
pub(crate) static UP_ENDPOINT: &str = "__up";

/// Cumulative byte counter for one transfer phase.
///
/// The transfer side is its only writer and the tick loop its only
/// reader; atomic access keeps the discipline sound even on a parallel
/// host.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `bytes` to the counter.
    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Current cumulative total.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A failed probe request.
#[derive(Debug)]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    /// Create a new ProbeError.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ProbeError {}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// One direction of byte exchange against a measurement target.
///
/// Implementations credit bytes to the shared [`ByteCounter`] as they
/// move, which is what the tick loop samples from.
pub trait TransferProbe: Send + Sync {
    /// Fetch up to `bytes` from the target's download endpoint, crediting
    /// received bytes to `counter` as they arrive. Implementations stop
    /// reading once `deadline` passes; an abandoned body is not a
    /// failure. Returns the bytes received by this request.
    fn download(
        &self,
        target: &ServerTarget,
        bytes: u64,
        counter: &ByteCounter,
        deadline: Instant,
    ) -> impl Future<Output = Result<u64, ProbeError>> + Send;

    /// Send `payload` to the target's upload endpoint, crediting sent
    /// bytes to `counter`. Returns the bytes credited for this request.
    fn upload(
        &self,
        target: &ServerTarget,
        payload: &[u8],
        counter: &ByteCounter,
    ) -> impl Future<Output = Result<u64, ProbeError>> + Send;

    /// One near-zero-payload round trip against the target, bounded by
    /// `timeout`. Returns the measured round-trip time.
    fn ping(
        &self,
        target: &ServerTarget,
        timeout: Duration,
    ) -> impl Future<Output = Result<Duration, ProbeError>> + Send;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_counter_accumulates() {
        let counter = ByteCounter::new();
        counter.add(100);
        counter.add(250);
        assert_eq!(counter.get(), 350);
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::new("connection refused");
        assert_eq!(err.to_string(), "connection refused");
    }
}
