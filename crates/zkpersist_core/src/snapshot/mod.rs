//! Full-state snapshots.
//!
//! A snapshot is a checkpoint of the state tree and session table as of a
//! zxid. Recovery loads the newest snapshot that validates and replays the
//! log from there.
//!
//! ```text
//! | header (16) | state (..) | sessions (..) | checksum (8) | 0x00000001 '/' |
//!               \___________ checksummed ___/
//! ```

mod file_snap;

pub use file_snap::{FileSnap, SNAPSHOT_TAIL};

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::CoreResult;
use crate::types::{TxnHeader, Zxid};

/// The in-memory state tree that snapshots capture and records mutate.
///
/// Payload bytes are opaque to the persistence layer; only the state knows
/// how to apply them.
pub trait DataState {
    /// Applies one committed transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be applied.
    fn apply_txn(&mut self, header: &TxnHeader, payload: &[u8]) -> CoreResult<()>;

    /// Writes the full state.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Replaces the state with one read from `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is short or malformed.
    fn deserialize(&mut self, input: &mut dyn Read) -> io::Result<()>;

    /// Discards everything, returning to the empty state.
    fn reset(&mut self);
}

/// Session bookkeeping saved alongside the state.
pub trait SessionStore {
    /// Writes every session.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Replaces the sessions with ones read from `input`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is short or malformed.
    fn deserialize(&mut self, input: &mut dyn Read) -> io::Result<()>;

    /// Discards every session.
    fn reset(&mut self);
}

/// Snapshot storage.
pub trait SnapShot {
    /// Loads the newest snapshot that validates into `state` and
    /// `sessions`, returning the zxid it reflects.
    ///
    /// Returns [`Zxid::NONE`] when there are no snapshots at all.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotNotFound`](crate::CoreError::SnapshotNotFound)
    /// if snapshots exist but none of the candidates validates.
    fn deserialize(&self, state: &mut dyn DataState, sessions: &mut dyn SessionStore) -> CoreResult<Zxid>;

    /// Writes a snapshot of `state` and `sessions` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not named `snapshot.<hex zxid>` or the
    /// file cannot be written or synced.
    fn serialize(&self, state: &dyn DataState, sessions: &dyn SessionStore, path: &Path) -> CoreResult<()>;

    /// Path of the snapshot with the highest zxid, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    fn find_most_recent_snapshot(&self) -> CoreResult<Option<PathBuf>>;

    /// Up to `n` snapshots, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    fn find_n_recent_snapshots(&self, n: usize) -> CoreResult<Vec<(Zxid, PathBuf)>>;

    /// Releases any resources held.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn close(&self) -> CoreResult<()>;
}
