//! File header shared by log segments and snapshots.
//!
//! ```text
//! | magic (4) | version (4) | dbid (8) |
//! ```
//!
//! All fields are big-endian. The magic tells the two formats apart; every
//! reader validates it before touching the rest of the file.

use bytes::{Buf, BufMut};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Magic of transaction log segments ("ZKLG").
pub const LOG_MAGIC: i32 = i32::from_be_bytes(*b"ZKLG");

/// Magic of snapshot files ("ZKSN").
pub const SNAP_MAGIC: i32 = i32::from_be_bytes(*b"ZKSN");

/// Current on-disk format version.
pub const VERSION: i32 = 2;

/// dbid written into snapshot headers.
pub const SNAPSHOT_DBID: i64 = -1;

/// Fixed-layout header written first in every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format magic.
    pub magic: i32,
    /// Format version.
    pub version: i32,
    /// Database id.
    pub dbid: i64,
}

impl FileHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Header for a new log segment.
    #[must_use]
    pub const fn log(dbid: i64) -> Self {
        Self {
            magic: LOG_MAGIC,
            version: VERSION,
            dbid,
        }
    }

    /// Header for a new snapshot.
    #[must_use]
    pub const fn snapshot() -> Self {
        Self {
            magic: SNAP_MAGIC,
            version: VERSION,
            dbid: SNAPSHOT_DBID,
        }
    }

    /// Encodes magic, version and dbid in that order.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut buf = &mut out[..];
        buf.put_i32(self.magic);
        buf.put_i32(self.version);
        buf.put_i64(self.dbid);
        out
    }

    /// Decodes a header from the first [`Self::SIZE`] bytes of `data`.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = &data[..Self::SIZE];
        Some(Self {
            magic: buf.get_i32(),
            version: buf.get_i32(),
            dbid: buf.get_i64(),
        })
    }

    /// Writes the header to `out`.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.encode())
    }

    /// Reads a header from `input`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if fewer than [`Self::SIZE`] bytes are available.
    pub fn read<R: Read + ?Sized>(input: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; Self::SIZE];
        input.read_exact(&mut raw)?;
        Self::decode(&raw).ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
    }

    /// Rejects the file at `path` unless the header carries `magic` and a
    /// supported version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] on a mismatch.
    pub fn validate(&self, magic: i32, path: &Path) -> CoreResult<()> {
        if self.magic != magic {
            return Err(CoreError::invalid_format(
                path,
                format!(
                    "magic {} does not match expected {}",
                    describe_magic(self.magic),
                    describe_magic(magic)
                ),
            ));
        }
        if self.version > VERSION {
            return Err(CoreError::invalid_format(
                path,
                format!("unsupported version {}", self.version),
            ));
        }
        Ok(())
    }
}

/// Renders a magic as its ASCII form when printable, hex otherwise.
#[must_use]
pub fn describe_magic(magic: i32) -> String {
    let bytes = magic.to_be_bytes();
    if bytes.iter().all(u8::is_ascii_graphic) {
        format!("\"{}\"", String::from_utf8_lossy(&bytes))
    } else {
        format!("{magic:#010x}")
    }
}
