//! Streaming iterator over log segments.
//!
//! Reads one segment at a time through a bounded buffer, advancing across
//! segment boundaries in ascending start-zxid order.
//!
//! # Error Handling
//!
//! - A short read, a length of 0 or -1, a record running past the end of
//!   the file, or a missing terminator ends the current segment; the
//!   iterator moves on to the next one. Preallocation leaves a zero-filled
//!   tail, so this is the normal way a segment ends.
//! - A checksum mismatch returns an error and exhausts the iterator.
//! - Any other negative length, or one above the record size limit, is
//!   reported as corruption.
//! - A segment whose header does not carry the log magic is rejected.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zkpersist_storage::{FileBackend, StorageBackend};

use crate::checksum::ChecksumKind;
use crate::error::{CoreError, CoreResult};
use crate::files::{self, LOG_PREFIX};
use crate::header::{FileHeader, LOG_MAGIC};
use crate::txnlog::record::{self, FRAME_PREFIX_SIZE, RECORD_TERMINATOR};
use crate::txnlog::TxnIterator;
use crate::types::{TxnRecord, Zxid};

/// Read buffer size for streaming iteration.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Buffered reader positioned inside one segment file.
struct SegmentCursor {
    path: PathBuf,
    backend: FileBackend,
    total_size: u64,
    /// File offset of the first byte not yet consumed.
    offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
}

impl SegmentCursor {
    /// Opens `path` and validates its header.
    ///
    /// Returns `Ok(None)` for a file too short to hold a header.
    fn open(path: &Path) -> CoreResult<Option<Self>> {
        let backend = FileBackend::open_read_only(path)?;
        let total_size = backend.allocated_size()?;
        if total_size < FileHeader::SIZE as u64 {
            debug!(path = %path.display(), "segment shorter than its header, skipping");
            return Ok(None);
        }

        let raw = backend.read_at(0, FileHeader::SIZE)?;
        let header = FileHeader::decode(&raw)
            .ok_or_else(|| CoreError::invalid_format(path, "truncated header"))?;
        header.validate(LOG_MAGIC, path)?;

        Ok(Some(Self {
            path: path.to_path_buf(),
            backend,
            total_size,
            offset: FileHeader::SIZE as u64,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
        }))
    }

    /// Ensures at least `min_bytes` unconsumed bytes are buffered.
    ///
    /// Returns `false` if the file ends first.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let remaining_in_file = self.total_size - self.offset;
        if remaining_in_file < min_bytes as u64 {
            return Ok(false);
        }

        if self.buffer_pos > 0 && available > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let unbuffered = remaining_in_file - available as u64;
        let to_read = ((self.buffer.len() - self.buffer_len) as u64).min(unbuffered) as usize;
        if to_read > 0 {
            let read_offset = self.offset + available as u64;
            let data = self.backend.read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    /// Reads the next record and its file offset.
    ///
    /// `Ok(None)` marks the logical end of this segment.
    fn next_record(
        &mut self,
        checksum: ChecksumKind,
        max_record_size: usize,
    ) -> CoreResult<Option<(u64, TxnRecord)>> {
        let start = self.offset;
        if !self.ensure_buffered(FRAME_PREFIX_SIZE)? {
            return Ok(None);
        }

        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + FRAME_PREFIX_SIZE]);
        let (stored, len) = record::decode_prefix(&prefix);

        if len == 0 || len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(CoreError::log_corruption(format!(
                "negative record length {len} at offset {start} in {}",
                self.path.display()
            )));
        }
        let len = len as usize;
        if len > max_record_size {
            return Err(CoreError::log_corruption(format!(
                "record length {len} at offset {start} in {} exceeds limit {max_record_size}",
                self.path.display()
            )));
        }

        let total = FRAME_PREFIX_SIZE + len + 1;
        if !self.ensure_buffered(total)? {
            debug!(path = %self.path.display(), offset = start, "record runs past end of segment");
            return Ok(None);
        }

        let body_start = self.buffer_pos + FRAME_PREFIX_SIZE;
        let body = &self.buffer[body_start..body_start + len];
        let computed = checksum.compute(body);
        if computed != stored {
            return Err(CoreError::ChecksumMismatch {
                path: self.path.clone(),
                expected: stored,
                actual: computed,
            });
        }

        if self.buffer[body_start + len] != RECORD_TERMINATOR {
            warn!(
                path = %self.path.display(),
                offset = start,
                "record without terminator, treating as end of segment"
            );
            return Ok(None);
        }

        let record = record::unmarshal(body)?;
        self.buffer_pos += total;
        self.offset += total as u64;
        Ok(Some((start, record)))
    }
}

enum State {
    Reading(SegmentCursor),
    Advance,
    Exhausted,
}

/// Iterator over records with zxid >= a starting zxid, across segments.
///
/// Opening the iterator positions it on the first matching record, so the
/// boundary used by truncation is known before any record is yielded.
pub struct FileTxnIterator {
    checksum: ChecksumKind,
    max_record_size: usize,
    pending: VecDeque<(Zxid, PathBuf)>,
    state: State,
    first: Option<TxnRecord>,
    boundary: Option<(PathBuf, u64)>,
    storage_size: u64,
}

impl FileTxnIterator {
    /// Opens an iterator over the segments in `log_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or the records
    /// before the first match cannot be read.
    pub fn open(
        log_dir: &Path,
        since: Zxid,
        checksum: ChecksumKind,
        max_record_size: usize,
    ) -> CoreResult<Self> {
        let segments = files::sorted_files(log_dir, LOG_PREFIX, true)?;
        let candidates = files::log_files_covering(&segments, since);
        Self::from_segments(candidates, since, checksum, max_record_size)
    }

    /// Opens an iterator over an explicit, ascending list of segments.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be read up to the first match.
    pub fn from_segments(
        segments: Vec<(Zxid, PathBuf)>,
        since: Zxid,
        checksum: ChecksumKind,
        max_record_size: usize,
    ) -> CoreResult<Self> {
        let mut storage_size = 0;
        for (_, path) in &segments {
            storage_size += std::fs::metadata(path)?.len();
        }

        let mut iter = Self {
            checksum,
            max_record_size,
            pending: segments.into(),
            state: State::Advance,
            first: None,
            boundary: None,
            storage_size,
        };
        iter.position(since)?;
        Ok(iter)
    }

    /// Skips records below `since` and holds on to the first one at or
    /// above it.
    fn position(&mut self, since: Zxid) -> CoreResult<()> {
        while let Some((offset, record)) = self.next_located()? {
            if record.zxid() < since {
                continue;
            }
            if let State::Reading(cursor) = &self.state {
                self.boundary = Some((cursor.path.clone(), offset));
            }
            self.first = Some(record);
            break;
        }
        Ok(())
    }

    /// Opens the next pending segment, or exhausts the iterator.
    fn advance(&mut self) -> CoreResult<()> {
        while let Some((start, path)) = self.pending.pop_front() {
            match SegmentCursor::open(&path) {
                Ok(Some(cursor)) => {
                    debug!(path = %path.display(), start = %start, "reading log segment");
                    self.state = State::Reading(cursor);
                    return Ok(());
                }
                Ok(None) => continue,
                Err(e) => {
                    self.state = State::Exhausted;
                    return Err(e);
                }
            }
        }
        self.state = State::Exhausted;
        Ok(())
    }

    fn next_located(&mut self) -> CoreResult<Option<(u64, TxnRecord)>> {
        loop {
            let step = match &mut self.state {
                State::Exhausted => return Ok(None),
                State::Advance => {
                    self.advance()?;
                    continue;
                }
                State::Reading(cursor) => cursor.next_record(self.checksum, self.max_record_size),
            };
            match step {
                Ok(Some(located)) => return Ok(Some(located)),
                Ok(None) => self.state = State::Advance,
                Err(e) => {
                    self.state = State::Exhausted;
                    return Err(e);
                }
            }
        }
    }

    /// Segment and byte offset of the first record with zxid >= the
    /// starting zxid, if one exists.
    #[must_use]
    pub fn boundary(&self) -> Option<(&Path, u64)> {
        self.boundary.as_ref().map(|(path, offset)| (path.as_path(), *offset))
    }

    /// Segments after the one currently being read.
    pub fn later_segments(&self) -> impl Iterator<Item = &Path> {
        self.pending.iter().map(|(_, path)| path.as_path())
    }
}

impl TxnIterator for FileTxnIterator {
    fn storage_size(&self) -> u64 {
        self.storage_size
    }
}

impl Iterator for FileTxnIterator {
    type Item = CoreResult<TxnRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.first.take() {
            return Some(Ok(record));
        }
        self.next_located().map(|r| r.map(|(_, record)| record)).transpose()
    }
}

impl std::fmt::Debug for FileTxnIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTxnIterator")
            .field("pending", &self.pending.len())
            .field("boundary", &self.boundary)
            .field("storage_size", &self.storage_size)
            .finish_non_exhaustive()
    }
}
