//! Persistence configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum::ChecksumKind;

/// What to do when an append carries a zxid that is not above the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZxidOrderPolicy {
    /// Log a warning and write the record anyway.
    #[default]
    Warn,
    /// Refuse the append with [`CoreError::OutOfOrderZxid`](crate::CoreError::OutOfOrderZxid).
    Reject,
}

/// Configuration supplied by the surrounding service at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding transaction log segments.
    pub log_dir: PathBuf,

    /// Directory holding snapshots.
    pub snap_dir: PathBuf,

    /// Whether `commit` forces segment data to disk.
    pub force_sync: bool,

    /// Preallocation chunk size for log segments (0 disables preallocation).
    pub prealloc_size: u64,

    /// How many recent snapshot files `deserialize` may try.
    pub snapshot_search_depth: usize,

    /// Checksum strategy for records and snapshots.
    pub checksum: ChecksumKind,

    /// Policy for out-of-order appends.
    pub zxid_order: ZxidOrderPolicy,

    /// Syncs slower than this are reported with a warning.
    pub fsync_warning_threshold: Duration,

    /// Largest record (marshaled header plus payload) accepted.
    pub max_record_size: usize,

    /// Roll to a new segment once the active one exceeds this many bytes.
    pub log_size_limit: Option<u64>,

    /// Database id written into new log segment headers.
    pub dbid: i64,
}

impl Config {
    /// Creates a configuration keeping logs and snapshots under `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref().to_path_buf();
        Self {
            log_dir: dir.clone(),
            snap_dir: dir,
            force_sync: true,
            prealloc_size: 64 * 1024 * 1024,
            snapshot_search_depth: 100,
            checksum: ChecksumKind::Adler32,
            zxid_order: ZxidOrderPolicy::Warn,
            fsync_warning_threshold: Duration::from_secs(1),
            max_record_size: 1024 * 1024,
            log_size_limit: None,
            dbid: 0,
        }
    }

    /// Keeps log segments in a separate directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Keeps snapshots in a separate directory.
    #[must_use]
    pub fn snap_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.snap_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets whether commit forces data to disk.
    #[must_use]
    pub fn force_sync(mut self, value: bool) -> Self {
        self.force_sync = value;
        self
    }

    /// Sets the preallocation chunk size.
    #[must_use]
    pub fn prealloc_size(mut self, size: u64) -> Self {
        self.prealloc_size = size;
        self
    }

    /// Sets the snapshot candidate search depth.
    #[must_use]
    pub fn snapshot_search_depth(mut self, depth: usize) -> Self {
        self.snapshot_search_depth = depth;
        self
    }

    /// Sets the checksum strategy.
    #[must_use]
    pub fn checksum(mut self, kind: ChecksumKind) -> Self {
        self.checksum = kind;
        self
    }

    /// Sets the out-of-order append policy.
    #[must_use]
    pub fn zxid_order(mut self, policy: ZxidOrderPolicy) -> Self {
        self.zxid_order = policy;
        self
    }

    /// Sets the slow-sync warning threshold.
    #[must_use]
    pub fn fsync_warning_threshold(mut self, threshold: Duration) -> Self {
        self.fsync_warning_threshold = threshold;
        self
    }

    /// Sets the maximum record size.
    #[must_use]
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Sets the size after which the active segment is rolled.
    #[must_use]
    pub fn log_size_limit(mut self, limit: Option<u64>) -> Self {
        self.log_size_limit = limit;
        self
    }

    /// Sets the dbid for new log segments.
    #[must_use]
    pub fn dbid(mut self, dbid: i64) -> Self {
        self.dbid = dbid;
        self
    }
}
