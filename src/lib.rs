//! Measures end-user network throughput by streaming real byte transfers
//! against remote echo endpoints.
//!
//! A run sequences three phases against a fixed measurement target
//! (latency, download, upload), converts raw transfer progress into a
//! jittered Mbps sample series, and persists a bounded history of past
//! results. Consumers poll [`SpeedTest::status`] or subscribe to pushed
//! [`ProgressEvent`]s; rendering is out of scope.
//!
//! # Example
//! ```no_run
//! use echo_speed::{EngineConfig, HistoryStore, SpeedTest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = HistoryStore::new("speed-history.json");
//!     let engine = SpeedTest::new(EngineConfig::default(), store).unwrap();
//!
//!     let result = engine.run_test().await.unwrap();
//!     println!(
//!         "down {:.1} Mbps, up {:.1} Mbps, ping {:?} ms",
//!         result.download_mbps, result.upload_mbps, result.ping_ms
//!     );
//! }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod history;
pub mod probe;
pub mod progress;
pub mod results;
pub mod retry;
pub mod sampler;
pub mod servers;

mod fallback;
mod stats;
mod transfer;

pub use config::EngineConfig;
pub use engine::SpeedTest;
pub use errors::{FailureKind, TestFailure};
pub use history::HistoryStore;
pub use probe::{HttpProbe, TransferProbe};
pub use progress::{
    Direction, EngineStatus, ProgressEvent, SpeedSample, TestPhase,
};
pub use results::TestResult;
pub use sampler::JitterMode;
pub use servers::ServerTarget;
