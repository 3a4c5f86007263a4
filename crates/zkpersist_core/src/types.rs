//! Core type definitions for zkpersist.

use bytes::{Buf, BufMut};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Transaction id: the system-wide total order of committed transactions.
///
/// The high 32 bits carry the leader epoch and the low 32 bits a counter
/// within that epoch. [`Zxid::NONE`] (-1) stands for "nothing logged".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zxid(pub i64);

impl Zxid {
    /// Sentinel for "no transaction".
    pub const NONE: Self = Self(-1);

    /// The smallest real zxid.
    pub const ZERO: Self = Self(0);

    /// Creates a zxid from its raw value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Builds a zxid from an epoch and a counter.
    #[must_use]
    pub const fn from_parts(epoch: u32, counter: u32) -> Self {
        Self(((epoch as i64) << 32) | counter as i64)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns the leader epoch (high 32 bits).
    #[must_use]
    pub const fn epoch(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the counter (low 32 bits).
    #[must_use]
    pub const fn counter(self) -> u32 {
        self.0 as u32
    }

    /// Returns true unless this is [`Zxid::NONE`] or another negative value.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Lower-case hex without prefix or padding, as used in file names.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Parses the hex suffix of a file name.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.is_empty() || s.starts_with('+') || s.starts_with('-') {
            return None;
        }
        i64::from_str_radix(s, 16).ok().map(Self)
    }
}

impl fmt::Display for Zxid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "0x{:x}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Fixed metadata preceding every logged transaction payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnHeader {
    /// Session that issued the request.
    pub session_id: i64,
    /// Client-side sequence number within the session.
    pub client_seq: i32,
    /// Transaction id.
    pub zxid: Zxid,
    /// Wall-clock time of the transaction in milliseconds.
    pub time: i64,
    /// Operation type, interpreted by the state collaborator.
    pub op_type: i32,
}

impl TxnHeader {
    /// Marshaled size in bytes.
    pub const SIZE: usize = 8 + 4 + 8 + 8 + 4;

    /// Creates a header.
    #[must_use]
    pub const fn new(session_id: i64, client_seq: i32, zxid: Zxid, time: i64, op_type: i32) -> Self {
        Self {
            session_id,
            client_seq,
            zxid,
            time,
            op_type,
        }
    }

    /// Appends the big-endian encoding to `buf`.
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.session_id);
        buf.put_i32(self.client_seq);
        buf.put_i64(self.zxid.as_i64());
        buf.put_i64(self.time);
        buf.put_i32(self.op_type);
    }

    /// Decodes a header from the front of `buf`, advancing it.
    pub fn decode_from<B: Buf>(buf: &mut B) -> CoreResult<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(CoreError::log_corruption(format!(
                "transaction header needs {} bytes, {} available",
                Self::SIZE,
                buf.remaining()
            )));
        }
        Ok(Self {
            session_id: buf.get_i64(),
            client_seq: buf.get_i32(),
            zxid: Zxid(buf.get_i64()),
            time: buf.get_i64(),
            op_type: buf.get_i32(),
        })
    }
}

/// A transaction as stored in the log: header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnRecord {
    /// Transaction header.
    pub header: TxnHeader,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl TxnRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(header: TxnHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Shorthand for `self.header.zxid`.
    #[must_use]
    pub fn zxid(&self) -> Zxid {
        self.header.zxid
    }
}
