//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// The buffer holds the allocated bytes; the logical size is tracked
/// separately so preallocated zero padding behaves like it does on disk.
///
/// # Example
///
/// ```rust
/// use zkpersist_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    size: RwLock<usize>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// The logical size equals the data length, as with a file opened from
    /// disk.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data: RwLock::new(data),
            size: RwLock::new(len),
        }
    }

    /// Returns a copy of all allocated bytes, padding included.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let mut size = self.size.write();
        let offset = *size;
        let end = offset + new_data.len();

        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(new_data);
        *size = end;

        Ok(offset as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read() as u64)
    }

    fn allocated_size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn preallocate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let new_len = new_len as usize;
        if new_len > data.len() {
            data.resize(new_len, 0);
        }
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut size = self.size.write();
        let allocated = data.len() as u64;

        if new_size > allocated {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                allocated,
            });
        }

        data.truncate(new_size as usize);
        *size = (*size).min(new_size as usize);
        Ok(())
    }
}
