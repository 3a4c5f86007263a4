//! Startup recovery: newest valid snapshot plus log replay.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::files;
use crate::snapshot::{DataState, FileSnap, SessionStore, SnapShot};
use crate::txnlog::{FileTxnIterator, FileTxnLog, TxnLog};
use crate::types::{TxnHeader, Zxid};

/// Result of [`FileTxnSnapLog::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Zxid of the snapshot loaded, or [`Zxid::NONE`] if none existed.
    pub snapshot_zxid: Zxid,
    /// Highest zxid reflected in the restored state.
    pub last_processed_zxid: Zxid,
    /// Records applied on top of the snapshot.
    pub txns_replayed: u64,
}

/// The transaction log and snapshot store of one server, under
/// `<log_dir>/version-2` and `<snap_dir>/version-2`.
///
/// # Example
///
/// ```no_run
/// use zkpersist_core::{Config, FileTxnSnapLog, SessionTable};
/// # use zkpersist_core::DataState;
/// # fn run(state: &mut dyn DataState) -> zkpersist_core::CoreResult<()> {
/// let persistence = FileTxnSnapLog::open(Config::new("/var/lib/zk"))?;
/// let mut sessions = SessionTable::new();
/// let outcome = persistence.restore(state, &mut sessions)?;
/// println!("recovered up to {}", outcome.last_processed_zxid);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileTxnSnapLog {
    txn_log: FileTxnLog,
    snap_log: FileSnap,
}

impl FileTxnSnapLog {
    /// Opens both stores, creating their directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or listed.
    pub fn open(config: Config) -> CoreResult<Self> {
        let log_dir = files::version_dir(&config.log_dir);
        let snap_dir = files::version_dir(&config.snap_dir);
        let txn_log = FileTxnLog::open(&log_dir, &config)?;
        let snap_log = FileSnap::open(&snap_dir, &config)?;
        debug!(log_dir = %log_dir.display(), snap_dir = %snap_dir.display(), "opened persistence");
        Ok(Self { txn_log, snap_log })
    }

    /// Rebuilds `state` and `sessions` from the newest valid snapshot and
    /// the log records after it.
    ///
    /// # Errors
    ///
    /// Returns an error if no snapshot candidate validates, the log is
    /// corrupt, or a record cannot be applied.
    pub fn restore(
        &self,
        state: &mut dyn DataState,
        sessions: &mut dyn SessionStore,
    ) -> CoreResult<RecoveryOutcome> {
        let started = Instant::now();
        self.snap_log.cleanup_temp_files()?;

        let snapshot_zxid = self.snap_log.deserialize(state, sessions)?;
        if !snapshot_zxid.is_valid() {
            warn!(dir = %self.snap_log.dir().display(), "no snapshot found, replaying the whole log");
        }

        let (last_processed_zxid, txns_replayed) = self.fast_forward(state, snapshot_zxid)?;
        info!(
            snapshot_zxid = %snapshot_zxid,
            last_processed_zxid = %last_processed_zxid,
            txns_replayed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "restored state"
        );
        Ok(RecoveryOutcome {
            snapshot_zxid,
            last_processed_zxid,
            txns_replayed,
        })
    }

    /// Applies every logged record with zxid above `from` to `state`.
    ///
    /// Returns the highest zxid applied (or `from` if none) and the number
    /// of records applied.
    ///
    /// # Errors
    ///
    /// Returns the first read or apply error; replay never skips records.
    pub fn fast_forward(&self, state: &mut dyn DataState, from: Zxid) -> CoreResult<(Zxid, u64)> {
        let mut highest = from;
        let mut applied = 0u64;
        for record in self.txn_log.read(from)? {
            let record = record?;
            let zxid = record.zxid();
            if zxid <= from {
                continue;
            }
            if zxid < highest {
                warn!(zxid = %zxid, highest = %highest, "log record below highest applied zxid");
            }
            state.apply_txn(&record.header, &record.payload)?;
            highest = highest.max(zxid);
            applied += 1;
        }
        Ok((highest, applied))
    }

    /// Writes a snapshot of `state` and `sessions` as of `zxid`.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if `zxid` is negative or the snapshot cannot be
    /// written.
    pub fn save(
        &self,
        state: &dyn DataState,
        sessions: &dyn SessionStore,
        zxid: Zxid,
    ) -> CoreResult<PathBuf> {
        if !zxid.is_valid() {
            return Err(CoreError::invalid_argument(format!(
                "cannot snapshot negative zxid {zxid}"
            )));
        }
        let path = self.snap_log.snapshot_path(zxid);
        info!(zxid = %zxid, path = %path.display(), "snapshotting");
        self.snap_log.serialize(state, sessions, &path)?;
        Ok(path)
    }

    /// Removes every logged record with zxid >= `zxid`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no log segments or files cannot be
    /// changed.
    pub fn truncate_log(&self, zxid: Zxid) -> CoreResult<bool> {
        self.txn_log.truncate(zxid)
    }

    /// See [`TxnLog::append`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the log.
    pub fn append(&self, header: Option<&TxnHeader>, payload: &[u8]) -> CoreResult<bool> {
        self.txn_log.append(header, payload)
    }

    /// See [`TxnLog::commit`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the log.
    pub fn commit(&self) -> CoreResult<()> {
        self.txn_log.commit()
    }

    /// See [`TxnLog::roll_log`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the log.
    pub fn roll_log(&self) -> CoreResult<()> {
        self.txn_log.roll_log()
    }

    /// See [`TxnLog::read`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the log.
    pub fn read(&self, since: Zxid) -> CoreResult<FileTxnIterator> {
        self.txn_log.read(since)
    }

    /// See [`TxnLog::last_logged_zxid`].
    ///
    /// # Errors
    ///
    /// Propagates errors from the log.
    pub fn last_logged_zxid(&self) -> CoreResult<Zxid> {
        self.txn_log.last_logged_zxid()
    }

    /// Path of the newest snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot directory cannot be listed.
    pub fn find_most_recent_snapshot(&self) -> CoreResult<Option<PathBuf>> {
        self.snap_log.find_most_recent_snapshot()
    }

    /// Flushes and releases both stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be flushed.
    pub fn close(&self) -> CoreResult<()> {
        self.txn_log.close()?;
        self.snap_log.close()
    }

    /// The transaction log.
    #[must_use]
    pub fn txn_log(&self) -> &FileTxnLog {
        &self.txn_log
    }

    /// The snapshot store.
    #[must_use]
    pub fn snapshots(&self) -> &FileSnap {
        &self.snap_log
    }

    /// Directory holding log segments.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.txn_log.dir()
    }

    /// Directory holding snapshots.
    #[must_use]
    pub fn snap_dir(&self) -> &Path {
        self.snap_log.dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionTable;
    use std::io::{self, Read, Write};
    use tempfile::tempdir;

    /// Sums payload bytes; serialized as the running total.
    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        total: u64,
        applied: Vec<i64>,
    }

    impl DataState for Counter {
        fn apply_txn(&mut self, header: &TxnHeader, payload: &[u8]) -> CoreResult<()> {
            self.total += payload.iter().map(|&b| u64::from(b)).sum::<u64>();
            self.applied.push(header.zxid.as_i64());
            Ok(())
        }

        fn serialize(&self, out: &mut dyn Write) -> io::Result<()> {
            out.write_all(&self.total.to_be_bytes())
        }

        fn deserialize(&mut self, input: &mut dyn Read) -> io::Result<()> {
            let mut raw = [0u8; 8];
            input.read_exact(&mut raw)?;
            self.total = u64::from_be_bytes(raw);
            Ok(())
        }

        fn reset(&mut self) {
            *self = Self::default();
        }
    }

    fn header(zxid: i64) -> TxnHeader {
        TxnHeader::new(1, 1, Zxid::new(zxid), 0, 1)
    }

    fn open(dir: &Path) -> FileTxnSnapLog {
        FileTxnSnapLog::open(Config::new(dir).prealloc_size(4096)).unwrap()
    }

    #[test]
    fn replays_log_after_snapshot() {
        let dir = tempdir().unwrap();
        let persistence = open(dir.path());
        let mut live = Counter::default();
        for zxid in 1..=5 {
            let payload = [zxid as u8];
            persistence.append(Some(&header(zxid)), &payload).unwrap();
            live.apply_txn(&header(zxid), &payload).unwrap();
            if zxid == 3 {
                persistence.commit().unwrap();
                persistence.save(&live, &SessionTable::new(), Zxid::new(3)).unwrap();
            }
        }
        persistence.commit().unwrap();
        persistence.close().unwrap();

        let persistence = open(dir.path());
        let mut restored = Counter::default();
        let outcome = persistence.restore(&mut restored, &mut SessionTable::new()).unwrap();
        assert_eq!(outcome.snapshot_zxid, Zxid::new(3));
        assert_eq!(outcome.last_processed_zxid, Zxid::new(5));
        assert_eq!(outcome.txns_replayed, 2);
        assert_eq!(restored.total, live.total);
        assert_eq!(restored.applied, vec![4, 5]);
    }

    #[test]
    fn without_snapshot_replays_everything() {
        let dir = tempdir().unwrap();
        let persistence = open(dir.path());
        for zxid in 1..=3 {
            persistence.append(Some(&header(zxid)), &[1]).unwrap();
        }
        persistence.commit().unwrap();

        let mut state = Counter::default();
        let outcome = persistence.restore(&mut state, &mut SessionTable::new()).unwrap();
        assert_eq!(outcome.snapshot_zxid, Zxid::NONE);
        assert_eq!(outcome.last_processed_zxid, Zxid::new(3));
        assert_eq!(state.total, 3);
    }

    #[test]
    fn empty_directories_restore_nothing() {
        let dir = tempdir().unwrap();
        let persistence = open(dir.path());
        let outcome = persistence
            .restore(&mut Counter::default(), &mut SessionTable::new())
            .unwrap();
        assert_eq!(outcome.last_processed_zxid, Zxid::NONE);
        assert_eq!(outcome.txns_replayed, 0);
        assert!(persistence.log_dir().ends_with("version-2"));
    }

    #[test]
    fn corrupt_log_record_fails_restore() {
        let dir = tempdir().unwrap();
        let persistence = open(dir.path());
        for zxid in 1..=3 {
            persistence.append(Some(&header(zxid)), b"payload").unwrap();
        }
        persistence.commit().unwrap();
        persistence.close().unwrap();

        let segment = persistence.log_dir().join("log.1");
        let mut raw = std::fs::read(&segment).unwrap();
        raw[16 + 12 + 34] ^= 0xFF;
        std::fs::write(&segment, raw).unwrap();

        let err = persistence
            .restore(&mut Counter::default(), &mut SessionTable::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn negative_zxid_is_never_snapshotted() {
        let dir = tempdir().unwrap();
        let persistence = open(dir.path());
        let err = persistence
            .save(&Counter::default(), &SessionTable::new(), Zxid::NONE)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
        assert_eq!(std::fs::read_dir(persistence.snap_dir()).unwrap().count(), 0);

        persistence
            .save(&Counter::default(), &SessionTable::new(), Zxid::ZERO)
            .unwrap();
        assert!(persistence.find_most_recent_snapshot().unwrap().is_some());
    }
}
