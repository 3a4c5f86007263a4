//! Test fixtures and data directory helpers.
//!
//! Provides convenience functions for setting up a server's data directory
//! in a temporary location and filling its log.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zkpersist_core::files;
use zkpersist_core::{Config, FileTxnSnapLog, TxnHeader, Zxid};

/// Preallocation used by fixtures, small enough to keep test files tiny.
pub const TEST_PREALLOC: u64 = 4096;

/// A data directory with automatic cleanup.
pub struct TempDataDir {
    config: Config,
    _temp_dir: TempDir,
}

impl TempDataDir {
    /// Creates an empty data directory with test-sized preallocation.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::new(temp_dir.path()).prealloc_size(TEST_PREALLOC);
        Self {
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Creates a data directory whose config is adjusted by `f`.
    pub fn with_config(f: impl FnOnce(Config) -> Config) -> Self {
        let mut dir = Self::new();
        dir.config = f(dir.config);
        dir
    }

    /// The root passed to [`Config::new`].
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// The configuration every [`open`](Self::open) uses.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the log and snapshot stores. Call again to simulate a restart.
    pub fn open(&self) -> FileTxnSnapLog {
        FileTxnSnapLog::open(self.config.clone()).expect("Failed to open persistence")
    }

    /// `version-2` directory holding log segments.
    pub fn log_dir(&self) -> PathBuf {
        files::version_dir(&self.config.log_dir)
    }

    /// `version-2` directory holding snapshots.
    pub fn snap_dir(&self) -> PathBuf {
        files::version_dir(&self.config.snap_dir)
    }

    /// Log segment file names, oldest first.
    pub fn segment_names(&self) -> Vec<String> {
        file_names(&self.log_dir(), files::LOG_PREFIX)
    }

    /// Snapshot file names, oldest first.
    pub fn snapshot_names(&self) -> Vec<String> {
        file_names(&self.snap_dir(), files::SNAPSHOT_PREFIX)
    }
}

impl Default for TempDataDir {
    fn default() -> Self {
        Self::new()
    }
}

fn file_names(dir: &Path, prefix: &str) -> Vec<String> {
    files::sorted_files(dir, prefix, true)
        .expect("Failed to list directory")
        .into_iter()
        .filter_map(|(_, path)| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect()
}

/// Header used by fixtures for a record at `zxid`.
pub fn header_for(zxid: i64) -> TxnHeader {
    TxnHeader::new(0x5E55_1011, (zxid & 0x7FFF_FFFF) as i32, Zxid::new(zxid), 1_700_000_000_000 + zxid, 1)
}

/// Payload used by fixtures for a record at `zxid`.
pub fn payload_for(zxid: i64) -> Vec<u8> {
    format!("txn-{zxid:x}").into_bytes()
}

/// Appends one record per zxid and commits them.
pub fn append_zxids(log: &FileTxnSnapLog, zxids: &[i64]) {
    for &zxid in zxids {
        log.append(Some(&header_for(zxid)), &payload_for(zxid))
            .expect("Failed to append");
    }
    log.commit().expect("Failed to commit");
}

/// Zxids returned by reading the whole log.
pub fn logged_zxids(log: &FileTxnSnapLog) -> Vec<i64> {
    log.read(Zxid::NONE)
        .expect("Failed to open log")
        .map(|r| r.expect("Failed to read record").zxid().as_i64())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_appends_and_reads_back() {
        let dir = TempDataDir::new();
        let log = dir.open();
        append_zxids(&log, &[1, 2, 3]);
        assert_eq!(logged_zxids(&log), vec![1, 2, 3]);
        assert_eq!(dir.segment_names(), vec!["log.1".to_string()]);
        assert!(dir.snapshot_names().is_empty());
    }

    #[test]
    fn with_config_applies_overrides() {
        let dir = TempDataDir::with_config(|c| c.snapshot_search_depth(2));
        assert_eq!(dir.config().snapshot_search_depth, 2);
        assert_eq!(dir.config().prealloc_size, TEST_PREALLOC);
    }
}
