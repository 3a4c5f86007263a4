//! A state tree that records every transaction applied to it.

use std::io::{self, Read, Write};
use zkpersist_core::{CoreError, CoreResult, DataState, TxnHeader, Zxid};

/// Records each applied transaction in order.
///
/// Two states are equal when they saw the same transactions, which makes
/// "recovered state equals the state before the restart" a plain
/// `assert_eq!`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingState {
    applied: Vec<(Zxid, Vec<u8>)>,
    reject_op: Option<i32>,
}

impl RecordingState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes [`apply_txn`](DataState::apply_txn) fail for records with this
    /// operation type.
    pub fn rejecting(op_type: i32) -> Self {
        Self {
            applied: Vec::new(),
            reject_op: Some(op_type),
        }
    }

    /// Zxids applied so far, in order.
    pub fn zxids(&self) -> Vec<i64> {
        self.applied.iter().map(|(z, _)| z.as_i64()).collect()
    }

    /// Highest zxid applied, or [`Zxid::NONE`].
    pub fn last_zxid(&self) -> Zxid {
        self.applied.last().map_or(Zxid::NONE, |(z, _)| *z)
    }

    /// Transactions applied so far.
    pub fn applied(&self) -> &[(Zxid, Vec<u8>)] {
        &self.applied
    }
}

impl DataState for RecordingState {
    fn apply_txn(&mut self, header: &TxnHeader, payload: &[u8]) -> CoreResult<()> {
        if self.reject_op == Some(header.op_type) {
            return Err(CoreError::state(format!(
                "op type {} rejected at {}",
                header.op_type, header.zxid
            )));
        }
        self.applied.push((header.zxid, payload.to_vec()));
        Ok(())
    }

    fn serialize(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&(self.applied.len() as u32).to_be_bytes())?;
        for (zxid, payload) in &self.applied {
            out.write_all(&zxid.as_i64().to_be_bytes())?;
            out.write_all(&(payload.len() as u32).to_be_bytes())?;
            out.write_all(payload)?;
        }
        Ok(())
    }

    fn deserialize(&mut self, input: &mut dyn Read) -> io::Result<()> {
        let count = read_u32(input)?;
        let mut applied = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let mut zxid = [0u8; 8];
            input.read_exact(&mut zxid)?;
            let len = read_u32(input)?;
            let mut payload = Vec::new();
            (&mut *input).take(u64::from(len)).read_to_end(&mut payload)?;
            if payload.len() != len as usize {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            applied.push((Zxid::new(i64::from_be_bytes(zxid)), payload));
        }
        self.applied = applied;
        Ok(())
    }

    fn reset(&mut self) {
        self.applied.clear();
    }
}

fn read_u32(input: &mut dyn Read) -> io::Result<u32> {
    let mut raw = [0u8; 4];
    input.read_exact(&mut raw)?;
    Ok(u32::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_deserialize_restores_equal_state() {
        let mut state = RecordingState::new();
        for zxid in 1..=3 {
            let header = TxnHeader::new(1, 0, Zxid::new(zxid), 0, 1);
            state.apply_txn(&header, &[zxid as u8; 3]).unwrap();
        }

        let mut buf = Vec::new();
        state.serialize(&mut buf).unwrap();

        let mut restored = RecordingState::new();
        restored.deserialize(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.last_zxid(), Zxid::new(3));
    }

    #[test]
    fn rejecting_state_fails_matching_op() {
        let mut state = RecordingState::rejecting(9);
        let header = TxnHeader::new(1, 0, Zxid::new(1), 0, 9);
        assert!(state.apply_txn(&header, b"").is_err());
        assert!(state.zxids().is_empty());
    }

    #[test]
    fn short_input_fails() {
        let mut state = RecordingState::new();
        let input = [0u8, 0, 0, 2, 0, 0];
        assert!(state.deserialize(&mut &input[..]).is_err());
    }
}
