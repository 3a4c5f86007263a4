//! # zkpersist Storage
//!
//! Byte-store backends underneath the zkpersist transaction log.
//!
//! Backends are **opaque byte stores** - they do not interpret the data
//! they store. The log and snapshot formats live in `zkpersist_core`.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, flush, sync, truncate)
//! - A backend distinguishes its *logical* size (where the next append
//!   lands) from its *allocated* size (physical length, including zero
//!   padding written ahead of time by [`StorageBackend::preallocate`])
//! - Must be `Send + Sync`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use zkpersist_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! backend.preallocate(64).unwrap();
//! assert_eq!(backend.size().unwrap(), 11);
//! assert_eq!(backend.allocated_size().unwrap(), 64);
//! assert_eq!(&backend.read_at(offset, 11).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{StorageBackend, ZERO_BLOCK_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
