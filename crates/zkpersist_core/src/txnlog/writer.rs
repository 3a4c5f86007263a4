//! Write side of a single log segment.

use std::path::{Path, PathBuf};

use tracing::debug;
use zkpersist_storage::{FileBackend, StorageBackend};

use crate::error::CoreResult;
use crate::header::FileHeader;
use crate::types::Zxid;

/// Returns the allocation needed before writing up to `projected` bytes,
/// or `None` when the current allocation already covers it.
///
/// The result is always a multiple of `chunk`.
#[must_use]
pub fn padded_size(projected: u64, allocated: u64, chunk: u64) -> Option<u64> {
    if chunk == 0 || projected <= allocated {
        return None;
    }
    Some(projected.div_ceil(chunk) * chunk)
}

/// An open, append-only log segment.
///
/// The segment owns its backend; dropping the writer closes the file.
pub struct SegmentWriter {
    path: PathBuf,
    start_zxid: Zxid,
    backend: Box<dyn StorageBackend>,
    prealloc_size: u64,
}

impl SegmentWriter {
    /// Creates the segment file at `path` and writes its header.
    ///
    /// # Errors
    ///
    /// Returns an error if a file already exists at `path`, or the file
    /// cannot be created or the header written.
    pub fn create(path: &Path, start_zxid: Zxid, dbid: i64, prealloc_size: u64) -> CoreResult<Self> {
        let backend = FileBackend::create_new(path)?;
        Self::with_backend(path, start_zxid, Box::new(backend), dbid, prealloc_size)
    }

    /// Starts a segment on an arbitrary backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn with_backend(
        path: &Path,
        start_zxid: Zxid,
        mut backend: Box<dyn StorageBackend>,
        dbid: i64,
        prealloc_size: u64,
    ) -> CoreResult<Self> {
        backend.append(&FileHeader::log(dbid).encode())?;
        debug!(path = %path.display(), start = %start_zxid, "created log segment");
        Ok(Self {
            path: path.to_path_buf(),
            start_zxid,
            backend,
            prealloc_size,
        })
    }

    /// Writes one framed record, extending the preallocation first when the
    /// frame would run past it.
    ///
    /// Returns the offset of the frame.
    ///
    /// # Errors
    ///
    /// Returns an error if padding or the write fails.
    pub fn append_frame(&mut self, frame: &[u8]) -> CoreResult<u64> {
        let position = self.backend.size()?;
        let allocated = self.backend.allocated_size()?;
        if let Some(target) = padded_size(position + frame.len() as u64, allocated, self.prealloc_size) {
            self.backend.preallocate(target)?;
        }
        Ok(self.backend.append(frame)?)
    }

    /// Pushes buffered data to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Forces data to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Bytes of header and records written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn logical_size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Physical size including preallocated padding.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn allocated_size(&self) -> CoreResult<u64> {
        Ok(self.backend.allocated_size()?)
    }

    /// Path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Zxid of the first record in this segment.
    #[must_use]
    pub fn start_zxid(&self) -> Zxid {
        self.start_zxid
    }
}

impl std::fmt::Debug for SegmentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("path", &self.path)
            .field("start_zxid", &self.start_zxid)
            .field("prealloc_size", &self.prealloc_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumKind;
    use crate::txnlog::record::encode_record;
    use crate::types::TxnHeader;
    use zkpersist_storage::InMemoryBackend;

    fn frame(zxid: i64, payload_len: usize) -> Vec<u8> {
        let header = TxnHeader::new(1, 1, Zxid::new(zxid), 0, 1);
        encode_record(&header, &vec![0xAB; payload_len], ChecksumKind::Adler32, 1 << 20).unwrap()
    }

    #[test]
    fn padded_size_rounds_to_chunk() {
        assert_eq!(padded_size(10, 0, 4096), Some(4096));
        assert_eq!(padded_size(4096, 4096, 4096), None);
        assert_eq!(padded_size(4097, 4096, 4096), Some(8192));
        assert_eq!(padded_size(20_000, 4096, 4096), Some(20_480));
        assert_eq!(padded_size(10, 0, 0), None);
    }

    #[test]
    fn header_is_written_first() {
        let writer = SegmentWriter::with_backend(
            Path::new("log.1"),
            Zxid::new(1),
            Box::new(InMemoryBackend::new()),
            42,
            0,
        )
        .unwrap();
        assert_eq!(writer.logical_size().unwrap(), FileHeader::SIZE as u64);
        assert_eq!(writer.start_zxid(), Zxid::new(1));
    }

    #[test]
    fn appends_preallocate_in_chunks() {
        let mut writer = SegmentWriter::with_backend(
            Path::new("log.1"),
            Zxid::new(1),
            Box::new(InMemoryBackend::new()),
            0,
            1024,
        )
        .unwrap();

        let offset = writer.append_frame(&frame(1, 10)).unwrap();
        assert_eq!(offset, FileHeader::SIZE as u64);
        assert_eq!(writer.allocated_size().unwrap(), 1024);

        for zxid in 2..40 {
            writer.append_frame(&frame(zxid, 10)).unwrap();
        }
        let logical = writer.logical_size().unwrap();
        let allocated = writer.allocated_size().unwrap();
        assert!(allocated >= logical);
        assert_eq!(allocated % 1024, 0);
    }

    #[test]
    fn file_segment_size_is_chunk_multiple() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.1");
        let mut writer = SegmentWriter::create(&path, Zxid::new(1), 0, 4096).unwrap();
        for zxid in 1..200 {
            writer.append_frame(&frame(zxid, 50)).unwrap();
        }
        writer.flush().unwrap();

        let on_disk = std::fs::metadata(&path).unwrap().len();
        assert_eq!(on_disk % 4096, 0);
        assert!(on_disk >= writer.logical_size().unwrap());
    }

    #[test]
    fn create_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.1");
        let mut writer = SegmentWriter::create(&path, Zxid::new(1), 0, 0).unwrap();
        writer.append_frame(&frame(1, 10)).unwrap();
        writer.flush().unwrap();
        let before = std::fs::read(&path).unwrap();
        drop(writer);

        assert!(SegmentWriter::create(&path, Zxid::new(1), 0, 0).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
