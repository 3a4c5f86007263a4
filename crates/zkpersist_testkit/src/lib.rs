//! # zkpersist Testkit
//!
//! Test utilities for zkpersist.
//!
//! This crate provides:
//! - Temporary data directories wired to a [`FileTxnSnapLog`]
//! - A recording state tree for recovery tests
//! - Property-based test generators using proptest
//! - Byte-level corruption helpers and a crashing storage backend
//! - On-disk format test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zkpersist_testkit::prelude::*;
//!
//! #[test]
//! fn replays_after_restart() {
//!     let dir = TempDataDir::new();
//!     let log = dir.open();
//!     append_zxids(&log, &[1, 2, 3]);
//!     // ... restart and restore
//! }
//! ```
//!
//! [`FileTxnSnapLog`]: zkpersist_core::FileTxnSnapLog

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corruption;
pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod state;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::corruption::*;
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::state::*;
}

pub use corruption::*;
pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use state::*;
pub use vectors::*;
