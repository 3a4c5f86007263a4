//! # zkpersist Core
//!
//! Durable transaction log and snapshot engine for a replicated
//! coordination service.
//!
//! This crate provides:
//! - A segmented, preallocated transaction log with per-record checksums
//! - Full-state snapshots with newest-first fallback on corruption
//! - Startup recovery: newest valid snapshot, then log replay
//! - Retention of old snapshots and segments
//!
//! Record payloads are opaque. The state they mutate is supplied by the
//! caller through [`DataState`] and [`SessionStore`].
//!
//! ## Example
//!
//! ```no_run
//! use zkpersist_core::{Config, FileTxnSnapLog, TxnHeader, Zxid};
//!
//! let persistence = FileTxnSnapLog::open(Config::new("/var/lib/zk"))?;
//! let header = TxnHeader::new(0x1234, 1, Zxid::new(1), 1_700_000_000_000, 1);
//! persistence.append(Some(&header), b"create /a")?;
//! persistence.commit()?;
//! # Ok::<(), zkpersist_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod checksum;
mod config;
mod error;
pub mod files;
mod header;
mod recovery;
pub mod retention;
mod session;
pub mod snapshot;
pub mod txnlog;
mod types;

pub use checksum::{Checksum, ChecksumKind};
pub use config::{Config, ZxidOrderPolicy};
pub use error::{CoreError, CoreResult};
pub use header::{FileHeader, LOG_MAGIC, SNAP_MAGIC, VERSION as FORMAT_VERSION};
pub use recovery::{FileTxnSnapLog, RecoveryOutcome};
pub use retention::{purge, PurgeReport};
pub use session::SessionTable;
pub use snapshot::{DataState, FileSnap, SessionStore, SnapShot};
pub use txnlog::{FileTxnIterator, FileTxnLog, TxnIterator, TxnLog};
pub use types::{TxnHeader, TxnRecord, Zxid};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
