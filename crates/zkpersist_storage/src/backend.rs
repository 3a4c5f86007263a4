//! Storage backend trait definition.

use crate::error::StorageResult;

/// Size of the zero-filled blocks written when extending allocation.
pub const ZERO_BLOCK_SIZE: usize = 64 * 1024;

/// A low-level storage backend for zkpersist.
///
/// Storage backends are **opaque byte stores**. The transaction log owns
/// all format interpretation - backends do not understand file headers,
/// records or checksums.
///
/// # Sizes
///
/// A backend tracks two lengths:
///
/// - the **logical size** ([`size`](Self::size)): the offset where the next
///   `append` writes
/// - the **allocated size** ([`allocated_size`](Self::allocated_size)): the
///   physical length, which may run past the logical size when zero padding
///   has been preallocated
///
/// Reads are bounded by the allocated size, so readers see the zero tail.
///
/// # Invariants
///
/// - `append` returns the logical offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `preallocate` never changes the logical size or previously written bytes
/// - `sync` ensures all appended data and the allocation are durable
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the allocated size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes data at the logical end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the logical size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Returns the allocated (physical) size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn allocated_size(&self) -> StorageResult<u64>;

    /// Extends the allocated size to `new_len` by writing zero blocks.
    ///
    /// Does nothing if `new_len` is not larger than the allocated size. The
    /// write position is restored to the logical size afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the padding cannot be written.
    fn preallocate(&mut self, new_len: u64) -> StorageResult<()>;

    /// Forces all data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// Both the logical and allocated size end up at most `new_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the allocated size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
