//! Crash simulation for log writers.
//!
//! [`CrashableBackend`] wraps a real backend and stops writing part-way
//! through an append, leaving a torn record on disk exactly as a power
//! loss would. Hand it to [`SegmentWriter::with_backend`] and keep the
//! [`CrashSwitch`] to arm it after the writer owns the backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zkpersist_testkit::crash::CrashableBackend;
//!
//! let (backend, switch) = CrashableBackend::create(&path);
//! let mut writer = SegmentWriter::with_backend(&path, start, Box::new(backend), 0, 0)?;
//! switch.crash_after(16 + first_frame.len() + 5);
//! ```
//!
//! [`SegmentWriter::with_backend`]: zkpersist_core::txnlog::SegmentWriter::with_backend

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use zkpersist_storage::{FileBackend, StorageBackend, StorageError, StorageResult};

/// Shared control of a [`CrashableBackend`].
#[derive(Debug)]
pub struct CrashSwitch {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
}

impl CrashSwitch {
    fn new() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
        }
    }

    /// Crash once this many bytes in total have been appended.
    pub fn crash_after(&self, bytes: usize) {
        self.crash_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Bytes appended so far, including any partial write.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Disarms the switch. Bytes already written stay counted.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
    }

    fn crash(&self, message: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(io::ErrorKind::Other, message.to_string()))
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<CrashSwitch>,
}

impl CrashableBackend {
    /// Wraps `inner`, returning the switch that controls it.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<CrashSwitch>) {
        let switch = Arc::new(CrashSwitch::new());
        let backend = Self {
            inner,
            switch: Arc::clone(&switch),
        };
        (backend, switch)
    }

    /// Wraps a newly created file at `path`.
    pub fn create(path: &Path) -> (Self, Arc<CrashSwitch>) {
        let file = FileBackend::create(path).expect("Failed to create file");
        Self::new(Box::new(file))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.switch.has_crashed() {
            return Err(self.switch.crash("write after simulated crash"));
        }

        let current = self.switch.bytes_written();
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if current + bytes.len() > threshold {
            // Torn write: only the bytes before the crash point reach the file.
            let partial_len = threshold.saturating_sub(current);
            if partial_len > 0 {
                let _ = self.inner.append(&bytes[..partial_len]);
                let _ = self.inner.flush();
            }
            self.switch
                .bytes_written
                .fetch_add(partial_len, Ordering::SeqCst);
            return Err(self.switch.crash("simulated crash during write"));
        }

        self.switch
            .bytes_written
            .fetch_add(bytes.len(), Ordering::SeqCst);
        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.switch.crash("simulated crash during flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn allocated_size(&self) -> StorageResult<u64> {
        self.inner.allocated_size()
    }

    fn preallocate(&mut self, new_len: u64) -> StorageResult<()> {
        self.inner.preallocate(new_len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.switch.crash("simulated crash during sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}
