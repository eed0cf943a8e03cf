//! Final run results and their aggregation into history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::HistoryStore;

/// Final figures for one completed run.
///
/// Created exactly once per completed run and immutable once built. The
/// throughput fields carry the cumulative-average Mbps of their phase,
/// not the last live sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Download throughput in Mbps.
    pub download_mbps: f64,
    /// Upload throughput in Mbps.
    pub upload_mbps: f64,
    /// Mean round-trip latency in whole milliseconds, when measurable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_ms: Option<u64>,
    /// Wall-clock completion time.
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    /// Create a result stamped with the current wall-clock time.
    pub fn new(
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: Option<u64>,
    ) -> Self {
        Self { download_mbps, upload_mbps, ping_ms, timestamp: Utc::now() }
    }
}

/// Assembles the final record for a run and commits it to history.
///
/// The aggregator is the only path from measured figures to persisted
/// state; persistence failures are logged inside the store and never
/// surface to the run.
pub struct Aggregator<'a> {
    store: &'a HistoryStore,
}

impl<'a> Aggregator<'a> {
    /// Create an aggregator committing into `store`.
    pub fn new(store: &'a HistoryStore) -> Self {
        Self { store }
    }

    /// Build the final record and persist it.
    pub fn commit(
        &self,
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: Option<u64>,
    ) -> TestResult {
        let result = TestResult::new(download_mbps, upload_mbps, ping_ms);
        self.store.append(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> HistoryStore {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "echo-speed-results-{}-{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        HistoryStore::new(path)
    }

    #[test]
    fn test_result_serialization_skips_absent_ping() {
        let result = TestResult::new(100.0, 50.0, None);
        let json = serde_json::to_string(&result).unwrap();

        assert!(json.contains("\"download_mbps\""));
        assert!(json.contains("\"upload_mbps\""));
        assert!(json.contains("\"timestamp\""));
        assert!(!json.contains("\"ping_ms\""));
    }

    #[test]
    fn test_result_deserializes_without_ping() {
        let json = r#"{
            "download_mbps": 88.5,
            "upload_mbps": 12.25,
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;

        let result: TestResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.download_mbps, 88.5);
        assert_eq!(result.ping_ms, None);
    }

    #[test]
    fn test_result_roundtrip() {
        let result = TestResult::new(100.0, 50.0, Some(18));
        let json = serde_json::to_string(&result).unwrap();
        let parsed: TestResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, result);
    }

    #[test]
    fn test_aggregator_commits_to_store() {
        let store = temp_store("commit");
        let aggregator = Aggregator::new(&store);

        let result = aggregator.commit(90.0, 45.0, Some(22));
        assert_eq!(result.download_mbps, 90.0);
        assert_eq!(result.ping_ms, Some(22));

        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], result);

        let _ = std::fs::remove_file(store.path());
    }
}
