//! File-based storage backend for persistent storage.

use crate::backend::{StorageBackend, ZERO_BLOCK_SIZE};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_data()` so data and the file length are on
///   disk
///
/// # Preallocation
///
/// [`preallocate`](StorageBackend::preallocate) writes zero blocks past the
/// current physical end and seeks back to the logical write offset, so
/// later appends overwrite padding instead of growing the file. Growing a
/// file one record at a time forces a metadata update per write.
///
/// # Example
///
/// ```no_run
/// use zkpersist_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create(Path::new("log.1")).unwrap();
/// backend.preallocate(64 * 1024 * 1024).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    allocated: RwLock<u64>,
    read_only: bool,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path, keeping existing
    /// contents.
    ///
    /// The logical size of an existing file is its full length.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Creates a new empty file, replacing any existing file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Creates a new empty file, failing if `path` already exists.
    ///
    /// # Errors
    ///
    /// Returns an I/O error of kind `AlreadyExists` if the file exists, or
    /// any other error from creating it.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Opens an existing file for reading only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, true)
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(len),
            allocated: RwLock::new(len),
            read_only,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.allocated.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.check_writable()?;
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();
        let mut allocated = self.allocated.write();

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;
        if *size > *allocated {
            *allocated = *size;
        }

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn allocated_size(&self) -> StorageResult<u64> {
        Ok(*self.allocated.read())
    }

    fn preallocate(&mut self, new_len: u64) -> StorageResult<()> {
        self.check_writable()?;
        let mut file = self.file.write();
        let mut allocated = self.allocated.write();

        if new_len <= *allocated {
            return Ok(());
        }

        file.seek(SeekFrom::Start(*allocated))?;
        let zeros = vec![0u8; ZERO_BLOCK_SIZE];
        let mut remaining = new_len - *allocated;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_BLOCK_SIZE as u64) as usize;
            file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        *allocated = new_len;

        file.seek(SeekFrom::Start(*self.size.read()))?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.check_writable()?;
        let file = self.file.write();
        let mut size = self.size.write();
        let mut allocated = self.allocated.write();

        if new_size > *allocated {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                allocated: *allocated,
            });
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *allocated = new_size;
        *size = (*size).min(new_size);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create_new(&path).unwrap();
        backend.append(b"kept").unwrap();
        backend.flush().unwrap();
        drop(backend);

        match FileBackend::create_new(&path) {
            Err(StorageError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::open(&path).unwrap();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);

        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn preallocate_pads_with_zeros_and_keeps_write_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"head").unwrap();
        backend.preallocate(200_000).unwrap();

        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.allocated_size().unwrap(), 200_000);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 200_000);

        let offset = backend.append(b"tail").unwrap();
        assert_eq!(offset, 4);
        backend.flush().unwrap();

        assert_eq!(backend.read_at(0, 8).unwrap(), b"headtail");
        assert!(backend.read_at(8, 1024).unwrap().iter().all(|&b| b == 0));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 200_000);
    }

    #[test]
    fn preallocate_smaller_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.preallocate(1024).unwrap();
        backend.preallocate(10).unwrap();
        assert_eq!(backend.allocated_size().unwrap(), 1024);
    }

    #[test]
    fn append_past_allocation_grows_allocation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.preallocate(4).unwrap();
        backend.append(b"longer than four").unwrap();
        assert_eq!(backend.allocated_size().unwrap(), 16);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        {
            let backend = FileBackend::open_read_only(&path).unwrap();
            assert_eq!(backend.size().unwrap(), 15);

            let data = backend.read_at(0, 15).unwrap();
            assert_eq!(&data, b"persistent data");
        }
    }

    #[test]
    fn create_discards_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");
        std::fs::write(&path, b"stale").unwrap();

        let backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");
        std::fs::write(&path, b"data").unwrap();

        let mut backend = FileBackend::open_read_only(&path).unwrap();
        assert!(matches!(backend.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.truncate(0), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.preallocate(100), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn truncate_shrinks_padded_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"hello world").unwrap();
        backend.preallocate(4096).unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.allocated_size().unwrap(), 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn truncate_beyond_allocation_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.1");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"abc").unwrap();
        assert!(matches!(
            backend.truncate(10),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("version-2").join("log.1");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }
}
