//! Session table saved with every snapshot.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use bytes::{Buf, BufMut};

use crate::snapshot::SessionStore;

/// Session id to timeout (milliseconds) mapping.
///
/// Serialized as a big-endian `i32` count followed by `(id: i64,
/// timeout: i32)` pairs in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    sessions: BTreeMap<i64, i32>,
}

impl SessionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a session, returning the previous timeout.
    pub fn insert(&mut self, session_id: i64, timeout: i32) -> Option<i32> {
        self.sessions.insert(session_id, timeout)
    }

    /// Removes a session, returning its timeout.
    pub fn remove(&mut self, session_id: i64) -> Option<i32> {
        self.sessions.remove(&session_id)
    }

    /// Timeout of a session.
    #[must_use]
    pub fn get(&self, session_id: i64) -> Option<i32> {
        self.sessions.get(&session_id).copied()
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i32)> + '_ {
        self.sessions.iter().map(|(&id, &timeout)| (id, timeout))
    }
}

impl SessionStore for SessionTable {
    fn serialize(&self, out: &mut dyn Write) -> io::Result<()> {
        let count = i32::try_from(self.sessions.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many sessions"))?;
        let mut buf = Vec::with_capacity(4 + self.sessions.len() * 12);
        buf.put_i32(count);
        for (&id, &timeout) in &self.sessions {
            buf.put_i64(id);
            buf.put_i32(timeout);
        }
        out.write_all(&buf)
    }

    fn deserialize(&mut self, input: &mut dyn Read) -> io::Result<()> {
        let mut raw = [0u8; 4];
        input.read_exact(&mut raw)?;
        let count = i32::from_be_bytes(raw);
        if count < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative session count {count}"),
            ));
        }

        self.sessions.clear();
        let mut entry = [0u8; 12];
        for _ in 0..count {
            input.read_exact(&mut entry)?;
            let mut buf = &entry[..];
            let id = buf.get_i64();
            let timeout = buf.get_i32();
            self.sessions.insert(id, timeout);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.sessions.clear();
    }
}
