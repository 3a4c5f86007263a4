//! Durable transaction log.
//!
//! The log is a directory of append-only segment files. Each segment starts
//! with a [`FileHeader`](crate::FileHeader) and holds framed records in
//! ascending zxid order:
//!
//! ```text
//! | checksum (8) | length (4) | txn header (32) | payload (N) | 'B' (1) |
//! ```
//!
//! Segments are zero-padded ahead of the write position, so a zero length
//! field marks the logical end of a segment.
//!
//! ## Durability
//!
//! A record is durable only once [`TxnLog::commit`] returns. A crash between
//! append and commit may lose the unflushed tail; recovery always starts
//! from a snapshot and replays forward.
//!
//! ## Recovery Policy
//!
//! - Torn or zero-filled tails end a segment and are tolerated
//! - Checksum mismatches are fatal for the iterator that hits them
//! - Records are never skipped silently

mod file_log;
mod iterator;
pub mod record;
mod writer;

pub use file_log::FileTxnLog;
pub use iterator::FileTxnIterator;
pub use writer::{padded_size, SegmentWriter};

use crate::error::CoreResult;
use crate::types::{TxnHeader, TxnRecord, Zxid};

/// A cursor over log records in ascending zxid order.
pub trait TxnIterator: Iterator<Item = CoreResult<TxnRecord>> {
    /// Total bytes of the segment files this iterator visits.
    fn storage_size(&self) -> u64;
}

/// The durable-log abstraction consumed by the rest of the service.
pub trait TxnLog {
    /// Iterator returned by [`read`](Self::read).
    type Iter: TxnIterator;

    /// Appends a record, opening a new segment if none is active.
    ///
    /// Returns `Ok(false)` without writing anything when `header` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is too large, is out of order under a
    /// rejecting policy, or cannot be written.
    fn append(&self, header: Option<&TxnHeader>, payload: &[u8]) -> CoreResult<bool>;

    /// Flushes every tracked segment, forcing it to disk when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a flush or sync fails.
    fn commit(&self) -> CoreResult<()>;

    /// Returns an iterator over records with zxid >= `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segments cannot be listed or opened.
    fn read(&self, since: Zxid) -> CoreResult<Self::Iter>;

    /// Removes every record with zxid >= `zxid`.
    ///
    /// Returns `true` if anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no segments or files cannot be changed.
    fn truncate(&self, zxid: Zxid) -> CoreResult<bool>;

    /// Detaches the current segment so the next append starts a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be flushed.
    fn roll_log(&self) -> CoreResult<()>;

    /// Highest zxid physically present in the log, or [`Zxid::NONE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be listed.
    fn last_logged_zxid(&self) -> CoreResult<Zxid>;

    /// Database id recorded in the earliest segment.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no segments or the header is invalid.
    fn db_id(&self) -> CoreResult<i64>;

    /// Flushes and releases every open segment.
    ///
    /// # Errors
    ///
    /// Returns an error if a flush fails.
    fn close(&self) -> CoreResult<()>;
}
