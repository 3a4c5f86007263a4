//! Segment-directory implementation of [`TxnLog`].

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zkpersist_storage::{FileBackend, StorageBackend};

use crate::config::{Config, ZxidOrderPolicy};
use crate::error::{CoreError, CoreResult};
use crate::files::{self, LOG_PREFIX};
use crate::header::{FileHeader, LOG_MAGIC};
use crate::txnlog::iterator::FileTxnIterator;
use crate::txnlog::record::encode_record;
use crate::txnlog::writer::SegmentWriter;
use crate::txnlog::TxnLog;
use crate::types::{TxnHeader, Zxid};

/// Mutable state guarded by the log's lock.
#[derive(Debug)]
struct LogState {
    /// Segments written since the last commit, oldest first. The newest is
    /// kept open across commits.
    writers: VecDeque<SegmentWriter>,
    /// Whether the newest tracked writer still accepts appends.
    active: bool,
    /// Highest zxid appended, or found on disk at open.
    last_zxid: Zxid,
}

/// A transaction log stored as `log.<hexzxid>` segment files in one
/// directory.
///
/// All operations take `&self` and serialize on an internal lock. The log
/// is meant to be driven by a single writer.
///
/// # Example
///
/// ```no_run
/// use zkpersist_core::{Config, FileTxnLog, TxnHeader, TxnLog, Zxid};
///
/// let config = Config::new("/var/lib/zk");
/// let log = FileTxnLog::open("/var/lib/zk/version-2", &config)?;
/// let header = TxnHeader::new(1, 1, Zxid::new(1), 0, 1);
/// log.append(Some(&header), b"payload")?;
/// log.commit()?;
/// # Ok::<(), zkpersist_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct FileTxnLog {
    dir: PathBuf,
    config: Config,
    state: Mutex<LogState>,
}

impl FileTxnLog {
    /// Opens the log stored in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: impl AsRef<Path>, config: &Config) -> CoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let last_zxid = scan_last_zxid(&dir, config)?;
        debug!(dir = %dir.display(), last_zxid = %last_zxid, "opened transaction log");
        Ok(Self {
            dir,
            config: config.clone(),
            state: Mutex::new(LogState {
                writers: VecDeque::new(),
                active: false,
                last_zxid,
            }),
        })
    }

    /// Directory holding the segments.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Segment files in ascending start-zxid order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn segments(&self) -> CoreResult<Vec<(Zxid, PathBuf)>> {
        files::sorted_files(&self.dir, LOG_PREFIX, true)
    }

    /// Makes room for a new segment at `path`. A leftover file holding no
    /// records (a crash right after creation) is removed; one holding
    /// records is never overwritten.
    fn clear_empty_segment(&self, zxid: Zxid, path: &Path) -> CoreResult<()> {
        if !path.exists() {
            return Ok(());
        }
        let holds_records = FileTxnIterator::from_segments(
            vec![(zxid, path.to_path_buf())],
            Zxid::NONE,
            self.config.checksum,
            self.config.max_record_size,
        )
        .map_or(true, |mut iter| iter.next().is_some());
        if holds_records {
            return Err(CoreError::SegmentExists {
                path: path.to_path_buf(),
            });
        }
        warn!(path = %path.display(), "replacing log segment that holds no records");
        fs::remove_file(path)?;
        Ok(())
    }

    fn check_order(&self, last: Zxid, zxid: Zxid) -> CoreResult<()> {
        if zxid > last {
            return Ok(());
        }
        match self.config.zxid_order {
            ZxidOrderPolicy::Warn => {
                warn!(last = %last, zxid = %zxid, "appending out of order zxid");
                Ok(())
            }
            ZxidOrderPolicy::Reject => Err(CoreError::OutOfOrderZxid { last, zxid }),
        }
    }

    fn roll_if_oversized(&self, state: &mut LogState) -> CoreResult<()> {
        let (Some(limit), true) = (self.config.log_size_limit, state.active) else {
            return Ok(());
        };
        if let Some(writer) = state.writers.back_mut() {
            let size = writer.logical_size()?;
            if size > limit {
                info!(path = %writer.path().display(), size, limit, "segment reached size limit, rolling");
                writer.flush()?;
                state.active = false;
            }
        }
        Ok(())
    }
}

impl TxnLog for FileTxnLog {
    type Iter = FileTxnIterator;

    fn append(&self, header: Option<&TxnHeader>, payload: &[u8]) -> CoreResult<bool> {
        let Some(header) = header else {
            return Ok(false);
        };
        if !header.zxid.is_valid() {
            return Err(CoreError::invalid_argument(format!(
                "cannot append negative zxid {}",
                header.zxid
            )));
        }

        let frame = encode_record(header, payload, self.config.checksum, self.config.max_record_size)?;

        let mut state = self.state.lock();
        self.check_order(state.last_zxid, header.zxid)?;
        self.roll_if_oversized(&mut state)?;

        if !state.active {
            let path = self.dir.join(files::log_file_name(header.zxid));
            self.clear_empty_segment(header.zxid, &path)?;
            info!(path = %path.display(), zxid = %header.zxid, "creating new log segment");
            let writer = SegmentWriter::create(
                &path,
                header.zxid,
                self.config.dbid,
                self.config.prealloc_size,
            )?;
            state.writers.push_back(writer);
            state.active = true;
        }

        let writer = state
            .writers
            .back_mut()
            .ok_or_else(|| CoreError::invalid_argument("no active log segment"))?;
        writer.append_frame(&frame)?;
        if header.zxid > state.last_zxid {
            state.last_zxid = header.zxid;
        }
        Ok(true)
    }

    fn commit(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        for writer in &mut state.writers {
            writer.flush()?;
            if self.config.force_sync {
                let started = Instant::now();
                writer.sync()?;
                let elapsed = started.elapsed();
                if elapsed > self.config.fsync_warning_threshold {
                    warn!(
                        path = %writer.path().display(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        threshold_ms = self.config.fsync_warning_threshold.as_millis() as u64,
                        "fsync of log segment was slow"
                    );
                }
            }
        }
        while state.writers.len() > 1 {
            if let Some(closed) = state.writers.pop_front() {
                debug!(path = %closed.path().display(), "closing committed log segment");
            }
        }
        Ok(())
    }

    fn read(&self, since: Zxid) -> CoreResult<FileTxnIterator> {
        FileTxnIterator::open(
            &self.dir,
            since,
            self.config.checksum,
            self.config.max_record_size,
        )
    }

    fn truncate(&self, zxid: Zxid) -> CoreResult<bool> {
        let mut state = self.state.lock();
        for writer in &mut state.writers {
            writer.flush()?;
        }
        state.writers.clear();
        state.active = false;

        let segments = self.segments()?;
        if segments.is_empty() {
            return Err(CoreError::NoLogFiles {
                dir: self.dir.clone(),
            });
        }

        let iter = FileTxnIterator::from_segments(
            files::log_files_covering(&segments, zxid),
            zxid,
            self.config.checksum,
            self.config.max_record_size,
        )?;
        let Some((path, offset)) = iter.boundary().map(|(p, o)| (p.to_path_buf(), o)) else {
            debug!(zxid = %zxid, "no records at or above truncation point");
            return Ok(false);
        };
        let later: Vec<PathBuf> = iter.later_segments().map(Path::to_path_buf).collect();
        drop(iter);

        if offset <= FileHeader::SIZE as u64 {
            fs::remove_file(&path)?;
        } else {
            let mut backend = FileBackend::open(&path)?;
            backend.truncate(offset)?;
        }
        for segment in &later {
            fs::remove_file(segment)?;
        }
        files::sync_dir(&self.dir)?;

        state.last_zxid = scan_last_zxid(&self.dir, &self.config)?;
        info!(
            zxid = %zxid,
            path = %path.display(),
            offset,
            removed_segments = later.len(),
            last_zxid = %state.last_zxid,
            "truncated transaction log"
        );
        Ok(true)
    }

    fn roll_log(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.active {
            if let Some(writer) = state.writers.back_mut() {
                writer.flush()?;
                debug!(path = %writer.path().display(), "rolled log segment");
            }
            state.active = false;
        }
        Ok(())
    }

    fn last_logged_zxid(&self) -> CoreResult<Zxid> {
        let _state = self.state.lock();
        scan_last_zxid(&self.dir, &self.config)
    }

    fn db_id(&self) -> CoreResult<i64> {
        let segments = self.segments()?;
        let Some((_, first)) = segments.first() else {
            return Err(CoreError::NoLogFiles {
                dir: self.dir.clone(),
            });
        };
        let mut file = fs::File::open(first)?;
        let header = FileHeader::read(&mut file)
            .map_err(|_| CoreError::invalid_format(first, "truncated header"))?;
        header.validate(LOG_MAGIC, first)?;
        Ok(header.dbid)
    }

    fn close(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        for writer in &mut state.writers {
            writer.flush()?;
        }
        state.writers.clear();
        state.active = false;
        Ok(())
    }
}

/// Finds the highest zxid on disk by reading segments newest first until
/// one yields a record.
///
/// A read error stops the scan of that segment with a warning; the highest
/// zxid read before it is kept.
fn scan_last_zxid(dir: &Path, config: &Config) -> CoreResult<Zxid> {
    let segments = files::sorted_files(dir, LOG_PREFIX, false)?;
    for segment in segments {
        let path = segment.1.clone();
        let mut last = Zxid::NONE;
        let iter = FileTxnIterator::from_segments(
            vec![segment],
            Zxid::NONE,
            config.checksum,
            config.max_record_size,
        );
        match iter {
            Ok(iter) => {
                for record in iter {
                    match record {
                        Ok(record) => last = last.max(record.zxid()),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "stopped scanning log segment");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "cannot scan log segment"),
        }
        if last.is_valid() {
            return Ok(last);
        }
    }
    Ok(Zxid::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txnlog::TxnIterator;
    use tempfile::tempdir;

    fn header(zxid: i64) -> TxnHeader {
        TxnHeader::new(0xabc, 1, Zxid::new(zxid), 1_700_000_000_000 + zxid, 2)
    }

    fn config(dir: &Path) -> Config {
        Config::new(dir).prealloc_size(4096)
    }

    fn zxids(log: &FileTxnLog, since: i64) -> Vec<i64> {
        log.read(Zxid::new(since))
            .unwrap()
            .map(|r| r.unwrap().zxid().as_i64())
            .collect()
    }

    #[test]
    fn append_commit_read_scenario() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();

        for zxid in [0x1, 0x2, 0x3] {
            assert!(log.append(Some(&header(zxid)), b"data").unwrap());
        }
        log.commit().unwrap();

        assert_eq!(log.last_logged_zxid().unwrap(), Zxid::new(0x3));
        assert_eq!(zxids(&log, 0x2), vec![0x2, 0x3]);
        assert!(dir.path().join("log.1").exists());
    }

    #[test]
    fn append_without_header_is_noop() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        assert!(!log.append(None, b"ignored").unwrap());
        assert!(log.segments().unwrap().is_empty());
    }

    #[test]
    fn records_round_trip() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        log.append(Some(&header(7)), b"\x00\x01binary\xff").unwrap();
        log.commit().unwrap();

        let record = log.read(Zxid::new(7)).unwrap().next().unwrap().unwrap();
        assert_eq!(record.header, header(7));
        assert_eq!(record.payload, b"\x00\x01binary\xff");
    }

    #[test]
    fn roll_log_starts_new_segment() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        log.append(Some(&header(1)), b"a").unwrap();
        log.append(Some(&header(2)), b"b").unwrap();
        log.roll_log().unwrap();
        log.append(Some(&header(3)), b"c").unwrap();
        log.commit().unwrap();

        let starts: Vec<i64> = log.segments().unwrap().iter().map(|(z, _)| z.as_i64()).collect();
        assert_eq!(starts, vec![1, 3]);
        assert_eq!(zxids(&log, 0), vec![1, 2, 3]);
        assert_eq!(zxids(&log, 2), vec![2, 3]);
    }

    #[test]
    fn truncate_removes_boundary_and_later() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        for zxid in [1, 2, 3] {
            log.append(Some(&header(zxid)), b"x").unwrap();
        }
        log.roll_log().unwrap();
        for zxid in [5, 9] {
            log.append(Some(&header(zxid)), b"x").unwrap();
        }
        log.commit().unwrap();

        assert!(log.truncate(Zxid::new(5)).unwrap());
        assert_eq!(zxids(&log, 0), vec![1, 2, 3]);
        assert!(!dir.path().join("log.5").exists());
        assert_eq!(log.last_logged_zxid().unwrap(), Zxid::new(3));
    }

    #[test]
    fn truncate_at_absent_zxid_cuts_at_next_record() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        for zxid in [1, 2, 3, 5, 9] {
            log.append(Some(&header(zxid)), b"x").unwrap();
        }
        log.commit().unwrap();

        assert!(log.truncate(Zxid::new(4)).unwrap());
        assert_eq!(zxids(&log, 0), vec![1, 2, 3]);

        // The log keeps working after truncation.
        log.append(Some(&header(4)), b"y").unwrap();
        log.commit().unwrap();
        assert_eq!(zxids(&log, 0), vec![1, 2, 3, 4]);
    }

    #[test]
    fn truncate_past_end_removes_nothing() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        log.append(Some(&header(1)), b"x").unwrap();
        log.commit().unwrap();

        assert!(!log.truncate(Zxid::new(10)).unwrap());
        assert_eq!(zxids(&log, 0), vec![1]);
    }

    #[test]
    fn truncate_empty_dir_fails() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        assert!(matches!(
            log.truncate(Zxid::new(1)),
            Err(CoreError::NoLogFiles { .. })
        ));
    }

    #[test]
    fn reject_policy_refuses_out_of_order() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path()).zxid_order(ZxidOrderPolicy::Reject);
        let log = FileTxnLog::open(dir.path(), &cfg).unwrap();
        log.append(Some(&header(5)), b"x").unwrap();

        let err = log.append(Some(&header(5)), b"x").unwrap_err();
        assert!(matches!(err, CoreError::OutOfOrderZxid { .. }));
        let err = log.append(Some(&header(4)), b"x").unwrap_err();
        assert!(matches!(err, CoreError::OutOfOrderZxid { .. }));
    }

    #[test]
    fn warn_policy_accepts_out_of_order() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        log.append(Some(&header(5)), b"x").unwrap();
        assert!(log.append(Some(&header(4)), b"x").unwrap());
    }

    #[test]
    fn reopened_log_remembers_last_zxid() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path()).zxid_order(ZxidOrderPolicy::Reject);
        {
            let log = FileTxnLog::open(dir.path(), &cfg).unwrap();
            log.append(Some(&header(8)), b"x").unwrap();
            log.commit().unwrap();
            log.close().unwrap();
        }
        let log = FileTxnLog::open(dir.path(), &cfg).unwrap();
        assert_eq!(log.last_logged_zxid().unwrap(), Zxid::new(8));
        assert!(log.append(Some(&header(8)), b"x").is_err());
        assert!(log.append(Some(&header(9)), b"x").unwrap());
    }

    #[test]
    fn size_limit_rolls_segments() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path()).log_size_limit(Some(200));
        let log = FileTxnLog::open(dir.path(), &cfg).unwrap();
        for zxid in 1..=10 {
            log.append(Some(&header(zxid)), &[0u8; 64]).unwrap();
        }
        log.commit().unwrap();

        assert!(log.segments().unwrap().len() > 1);
        assert_eq!(zxids(&log, 0), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn preallocated_segment_is_chunk_multiple() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        for zxid in 1..=100 {
            log.append(Some(&header(zxid)), &[7u8; 100]).unwrap();
        }
        log.commit().unwrap();

        let len = fs::metadata(dir.path().join("log.1")).unwrap().len();
        assert!(len > 4096);
        assert_eq!(len % 4096, 0);
        assert_eq!(zxids(&log, 0).len(), 100);
    }

    #[test]
    fn oversized_record_rejected() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path()).max_record_size(64);
        let log = FileTxnLog::open(dir.path(), &cfg).unwrap();
        let err = log.append(Some(&header(1)), &[0u8; 64]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn db_id_reads_earliest_segment() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path()).dbid(77)).unwrap();
        assert!(matches!(log.db_id(), Err(CoreError::NoLogFiles { .. })));
        log.append(Some(&header(1)), b"x").unwrap();
        log.commit().unwrap();
        assert_eq!(log.db_id().unwrap(), 77);
    }

    #[test]
    fn storage_size_covers_visited_segments() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        log.append(Some(&header(1)), b"x").unwrap();
        log.commit().unwrap();
        assert_eq!(log.read(Zxid::ZERO).unwrap().storage_size(), 4096);
    }

    #[test]
    fn commit_keeps_only_newest_writer() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        for zxid in 1..=3 {
            log.append(Some(&header(zxid)), b"x").unwrap();
            log.roll_log().unwrap();
        }
        assert_eq!(log.state.lock().writers.len(), 3);
        log.commit().unwrap();
        assert_eq!(log.state.lock().writers.len(), 1);
    }

    #[test]
    fn reappending_segment_start_keeps_committed_records() {
        let dir = tempdir().unwrap();
        {
            let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
            for zxid in 1..=3 {
                log.append(Some(&header(zxid)), b"x").unwrap();
            }
            log.commit().unwrap();
            log.close().unwrap();
        }

        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        let err = log.append(Some(&header(1)), b"y").unwrap_err();
        assert!(matches!(err, CoreError::SegmentExists { .. }));
        assert_eq!(zxids(&log, 0), vec![1, 2, 3]);
    }

    #[test]
    fn empty_leftover_segment_is_replaced() {
        let dir = tempdir().unwrap();
        {
            let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
            for zxid in 1..=3 {
                log.append(Some(&header(zxid)), b"x").unwrap();
            }
            log.commit().unwrap();
            log.close().unwrap();
        }
        // Crash right after the next segment was created.
        fs::write(dir.path().join("log.4"), FileHeader::log(0).encode()).unwrap();

        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();
        assert!(log.append(Some(&header(4)), b"x").unwrap());
        log.commit().unwrap();
        assert_eq!(zxids(&log, 0), vec![1, 2, 3, 4]);
    }

    #[test]
    fn appends_from_many_threads_are_all_logged() {
        let dir = tempdir().unwrap();
        let log = FileTxnLog::open(dir.path(), &config(dir.path())).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4i64 {
                let log = &log;
                scope.spawn(move || {
                    for i in 1..=25 {
                        let zxid = t * 100 + i;
                        log.append(Some(&header(zxid)), &zxid.to_be_bytes()).unwrap();
                        if i % 5 == 0 {
                            log.roll_log().unwrap();
                        }
                        if i % 3 == 0 {
                            log.commit().unwrap();
                        }
                    }
                });
            }
        });
        log.commit().unwrap();

        let mut logged = zxids(&log, -1);
        logged.sort_unstable();
        let expected: Vec<i64> = (0..4i64)
            .flat_map(|t| (1..=25).map(move |i| t * 100 + i))
            .collect();
        assert_eq!(logged, expected);
    }
}
