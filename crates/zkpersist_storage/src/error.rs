//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the physical end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current physical size.
        size: u64,
    },

    /// Attempted to truncate to a length larger than the allocated size.
    #[error("cannot truncate to {requested} bytes, allocated size is {allocated}")]
    TruncateBeyondEnd {
        /// The requested new size.
        requested: u64,
        /// The current allocated size.
        allocated: u64,
    },

    /// The backend was opened read-only and cannot be modified.
    #[error("storage is read-only")]
    ReadOnly,
}
