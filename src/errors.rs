//! Failure types for the measurement engine.
//!
//! Most failure conditions degrade the run rather than aborting it; only
//! the kinds marked fatal surface to the caller of `run_test`.

use std::error::Error;
use std::fmt;

/// Categories of failure that can occur during a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No candidate measurement targets could be resolved.
    ServerResolution,
    /// A latency round trip failed after exhausting its retries.
    Probe,
    /// A transfer phase produced no measurable throughput.
    Transfer,
    /// Even the degraded fallback probing failed.
    Fallback,
    /// The history store could not be read or written.
    Persistence,
    /// No network surface is reachable at all.
    Network,
    /// A test run is already active.
    Busy,
    /// The run was aborted on request.
    Aborted,
}

impl FailureKind {
    /// Whether this failure aborts the run instead of degrading it.
    ///
    /// Non-fatal kinds are recovered internally: probe failures fall back
    /// to a fixed latency constant, transfer failures route through the
    /// fallback estimator, fallback failures degrade to zero-valued result
    /// fields, and persistence failures are logged and swallowed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FailureKind::ServerResolution
                | FailureKind::Network
                | FailureKind::Busy
                | FailureKind::Aborted
        )
    }

    /// Get a user-friendly description of this failure kind.
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::ServerResolution => "Server resolution error",
            FailureKind::Probe => "Latency probe error",
            FailureKind::Transfer => "Transfer error",
            FailureKind::Fallback => "Fallback estimation error",
            FailureKind::Persistence => "History persistence error",
            FailureKind::Network => "Network error",
            FailureKind::Busy => "Engine busy",
            FailureKind::Aborted => "Run aborted",
        }
    }
}

/// A failed test run, carrying a human-readable cause.
#[derive(Debug)]
pub struct TestFailure {
    /// The kind of failure.
    pub kind: FailureKind,
    /// User-friendly failure message.
    pub message: String,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl TestFailure {
    /// Create a new TestFailure.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a server resolution failure.
    pub fn server_resolution(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerResolution, message)
    }

    /// Create a network failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    /// Create a busy failure for a rejected reentrant run.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Busy, message)
    }

    /// Create an aborted failure.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Aborted, message)
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)
    }
}

impl Error for TestFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}
