//! Snapshot files in a directory.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BufMut;
use tracing::{debug, info, warn};

use crate::checksum::{ChecksumKind, ChecksumReader, ChecksumWriter};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::files::{self, SNAPSHOT_PREFIX};
use crate::header::{FileHeader, SNAP_MAGIC};
use crate::snapshot::{DataState, SessionStore, SnapShot};
use crate::types::Zxid;

/// Bytes closing every snapshot: an `i32` 1 followed by `'/'`.
pub const SNAPSHOT_TAIL: [u8; 5] = [0, 0, 0, 1, b'/'];

/// Checksum plus tail.
const TRAILER_SIZE: u64 = 8 + SNAPSHOT_TAIL.len() as u64;

/// Smallest possible snapshot: header and trailer around an empty body.
const MIN_SNAPSHOT_SIZE: u64 = FileHeader::SIZE as u64 + TRAILER_SIZE;

const TEMP_SUFFIX: &str = ".tmp";

/// Snapshots stored as `snapshot.<hexzxid>` files in one directory.
#[derive(Debug, Clone)]
pub struct FileSnap {
    dir: PathBuf,
    checksum: ChecksumKind,
    search_depth: usize,
}

impl FileSnap {
    /// Opens the snapshot directory `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>, config: &Config) -> CoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            checksum: config.checksum,
            search_depth: config.snapshot_search_depth,
        })
    }

    /// Directory holding the snapshots.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a snapshot of `zxid` is written to.
    #[must_use]
    pub fn snapshot_path(&self, zxid: Zxid) -> PathBuf {
        self.dir.join(files::snapshot_file_name(zxid))
    }

    /// Up to `n` snapshots, newest first, that pass [`is_valid_snapshot`].
    ///
    /// Files that cannot be inspected are skipped with a warning.
    ///
    /// [`is_valid_snapshot`]: Self::is_valid_snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn find_n_valid_snapshots(&self, n: usize) -> CoreResult<Vec<(Zxid, PathBuf)>> {
        let mut valid = Vec::new();
        for (zxid, path) in files::sorted_files(&self.dir, SNAPSHOT_PREFIX, false)? {
            if valid.len() >= n {
                break;
            }
            match Self::is_valid_snapshot(&path) {
                Ok(true) => valid.push((zxid, path)),
                Ok(false) => debug!(path = %path.display(), "skipping incomplete snapshot"),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot inspect snapshot"),
            }
        }
        Ok(valid)
    }

    /// Cheap structural check: the name carries a zxid, the file is large
    /// enough for header and trailer, and it ends with the snapshot tail.
    ///
    /// Does not verify the checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn is_valid_snapshot(path: &Path) -> CoreResult<bool> {
        if files::zxid_from_path(path, SNAPSHOT_PREFIX).is_none() {
            return Ok(false);
        }
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < MIN_SNAPSHOT_SIZE {
            return Ok(false);
        }
        file.seek(SeekFrom::Start(len - SNAPSHOT_TAIL.len() as u64))?;
        let mut tail = [0u8; SNAPSHOT_TAIL.len()];
        file.read_exact(&mut tail)?;
        Ok(tail == SNAPSHOT_TAIL)
    }

    /// Checks the header, checksum and tail of a snapshot file without
    /// decoding its contents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] for a malformed file and
    /// [`CoreError::ChecksumMismatch`] when the body does not match.
    pub fn verify_file(path: &Path, checksum: ChecksumKind) -> CoreResult<()> {
        if !Self::is_valid_snapshot(path)? {
            return Err(CoreError::invalid_format(path, "missing snapshot tail"));
        }
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        read_header(&mut reader, path)?;

        let body_len = len - MIN_SNAPSHOT_SIZE;
        let mut checked = ChecksumReader::new((&mut reader).take(body_len), checksum);
        io::copy(&mut checked, &mut io::sink())?;
        let computed = checked.value();
        drop(checked);
        let stored = read_stored_checksum(&mut reader)?;
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: stored,
                actual: computed,
            });
        }
        Ok(())
    }

    /// Removes temporary files left by interrupted snapshot writes.
    ///
    /// Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a file cannot
    /// be removed.
    pub fn cleanup_temp_files(&self) -> CoreResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(dir = %self.dir.display(), removed, "removed incomplete snapshot files");
        }
        Ok(removed)
    }

    /// Streams one candidate into the collaborators and checks its checksum.
    fn load(
        &self,
        path: &Path,
        state: &mut dyn DataState,
        sessions: &mut dyn SessionStore,
    ) -> CoreResult<()> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        read_header(&mut reader, path)?;

        let body_len = len
            .checked_sub(MIN_SNAPSHOT_SIZE)
            .ok_or_else(|| CoreError::invalid_format(path, "file too short"))?;
        let mut checked = ChecksumReader::new((&mut reader).take(body_len), self.checksum);
        state.deserialize(&mut checked)?;
        sessions.deserialize(&mut checked)?;
        let computed = checked.value();
        let unread = checked.get_mut().limit();
        if unread != 0 {
            return Err(CoreError::invalid_format(
                path,
                format!("{unread} bytes left after state and sessions"),
            ));
        }
        drop(checked);

        let stored = read_stored_checksum(&mut reader)?;
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: stored,
                actual: computed,
            });
        }
        Ok(())
    }
}

impl SnapShot for FileSnap {
    fn deserialize(&self, state: &mut dyn DataState, sessions: &mut dyn SessionStore) -> CoreResult<Zxid> {
        let candidates = self.find_n_valid_snapshots(self.search_depth)?;
        if candidates.is_empty() {
            debug!(dir = %self.dir.display(), "no snapshots to load");
            return Ok(Zxid::NONE);
        }

        for (zxid, path) in &candidates {
            state.reset();
            sessions.reset();
            match self.load(path, state, sessions) {
                Ok(()) => {
                    info!(path = %path.display(), zxid = %zxid, "loaded snapshot");
                    return Ok(*zxid);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "problem reading snapshot, trying an older one");
                }
            }
        }

        state.reset();
        sessions.reset();
        Err(CoreError::SnapshotNotFound {
            candidates: candidates.len(),
        })
    }

    fn serialize(&self, state: &dyn DataState, sessions: &dyn SessionStore, path: &Path) -> CoreResult<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::invalid_argument(format!("bad snapshot path {}", path.display())))?;
        if files::zxid_from_path(path, SNAPSHOT_PREFIX).is_none() {
            return Err(CoreError::invalid_argument(format!(
                "{file_name} is not a snapshot file name"
            )));
        }
        let temp_path = path.with_file_name(format!("{file_name}{TEMP_SUFFIX}"));

        let file = File::create(&temp_path)?;
        let mut out = BufWriter::new(file);
        FileHeader::snapshot().write(&mut out)?;

        let mut checked = ChecksumWriter::new(out, self.checksum);
        state.serialize(&mut checked)?;
        sessions.serialize(&mut checked)?;
        let value = checked.value();
        let mut out = checked.into_inner();

        let mut trailer = Vec::with_capacity(TRAILER_SIZE as usize);
        trailer.put_i64(value as i64);
        trailer.put_slice(&SNAPSHOT_TAIL);
        out.write_all(&trailer)?;

        let file = out.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        if let Some(parent) = path.parent() {
            files::sync_dir(parent)?;
        }
        info!(path = %path.display(), checksum = value, "wrote snapshot");
        Ok(())
    }

    fn find_most_recent_snapshot(&self) -> CoreResult<Option<PathBuf>> {
        Ok(self.find_n_recent_snapshots(1)?.pop().map(|(_, path)| path))
    }

    fn find_n_recent_snapshots(&self, n: usize) -> CoreResult<Vec<(Zxid, PathBuf)>> {
        let mut snapshots = files::sorted_files(&self.dir, SNAPSHOT_PREFIX, false)?;
        snapshots.truncate(n);
        Ok(snapshots)
    }

    fn close(&self) -> CoreResult<()> {
        Ok(())
    }
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> CoreResult<FileHeader> {
    let header = FileHeader::read(reader).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CoreError::invalid_format(path, "truncated header"),
        _ => CoreError::Io(e),
    })?;
    header.validate(SNAP_MAGIC, path)?;
    Ok(header)
}

fn read_stored_checksum<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut raw = [0u8; 8];
    reader.read_exact(&mut raw)?;
    Ok(i64::from_be_bytes(raw) as u64)
}
