//! Bounded persisted history of past test results.
//!
//! The store is the single writer to its backing file. Every append
//! rewrites the whole bounded list through a sibling temp file and an
//! atomic rename, so a crash between an append and the next read leaves
//! the previously committed state intact.

use crate::results::TestResult;
use log::warn;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum number of persisted results.
pub const MAX_ENTRIES: usize = 20;

/// Bounded, newest-first store of past test results.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open a store backed by `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `result` at the head, evicting the oldest entry once the
    /// list exceeds [`MAX_ENTRIES`].
    ///
    /// Read and write failures are logged and swallowed: history is a
    /// best-effort record and never fails a run.
    pub fn append(&self, result: &TestResult) {
        let mut entries = self.list();
        entries.insert(0, result.clone());
        entries.truncate(MAX_ENTRIES);

        if let Err(err) = self.write_all(&entries) {
            warn!(
                "failed to persist history to {}: {}",
                self.path.display(),
                err
            );
        }
    }

    /// All persisted results, newest-first.
    ///
    /// Missing, corrupt, or unreadable state reads as an empty store.
    pub fn list(&self) -> Vec<TestResult> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str::<Vec<TestResult>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(MAX_ENTRIES);
                entries
            }
            Err(err) => {
                warn!(
                    "discarding malformed history at {}: {}",
                    self.path.display(),
                    err
                );
                Vec::new()
            }
        }
    }

    fn write_all(&self, entries: &[TestResult]) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(std::io::Error::other)?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }
}
