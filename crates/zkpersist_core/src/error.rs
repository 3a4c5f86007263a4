//! Error types for zkpersist core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Zxid;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in zkpersist core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] zkpersist_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A file header does not carry the magic of the expected format.
    #[error("invalid format in {}: {message}", path.display())]
    InvalidFormat {
        /// File being read.
        path: PathBuf,
        /// Description of the format issue.
        message: String,
    },

    /// Stored checksum does not match the checksum of the bytes read.
    #[error("checksum mismatch in {}: stored {expected:#x}, computed {actual:#x}", path.display())]
    ChecksumMismatch {
        /// File being read.
        path: PathBuf,
        /// Checksum stored on disk.
        expected: u64,
        /// Checksum computed while reading.
        actual: u64,
    },

    /// A log segment contains a structurally impossible record.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// No snapshot candidate validated within the search depth.
    #[error("no valid snapshot found among {candidates} candidate(s)")]
    SnapshotNotFound {
        /// Number of candidates tried.
        candidates: usize,
    },

    /// The log directory holds no segment files.
    #[error("no log segments found in {}", dir.display())]
    NoLogFiles {
        /// Log directory searched.
        dir: PathBuf,
    },

    /// An append arrived with a zxid not above the last appended one.
    #[error("out of order append: zxid {zxid} is not above last appended {last}")]
    OutOfOrderZxid {
        /// Highest zxid appended so far.
        last: Zxid,
        /// Rejected zxid.
        zxid: Zxid,
    },

    /// A new segment would overwrite one that already holds records.
    #[error("log segment {} already exists and holds records", path.display())]
    SegmentExists {
        /// Existing segment.
        path: PathBuf,
    },

    /// Caller passed an invalid value.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A state or session collaborator failed.
    #[error("state collaborator error: {message}")]
    State {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a state collaborator error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Returns true for integrity failures: checksum mismatches and
    /// structurally corrupt records.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::LogCorruption { .. })
    }
}
