//! Record framing for log segments.
//!
//! ```text
//! | checksum (8) | length (4) | header (32) | payload (N) | 'B' (1) |
//!                             \______ length bytes ______/
//! ```
//!
//! The checksum covers the marshaled header and payload. A length of zero
//! or -1 marks the end of the logical data in a zero-padded segment.

use bytes::BufMut;

use crate::checksum::ChecksumKind;
use crate::error::{CoreError, CoreResult};
use crate::types::{TxnHeader, TxnRecord};

/// Byte written after every record.
pub const RECORD_TERMINATOR: u8 = b'B';

/// Size of the checksum and length fields preceding the record body.
pub const FRAME_PREFIX_SIZE: usize = 8 + 4;

/// Framing bytes around a record body: prefix plus terminator.
pub const FRAME_OVERHEAD: usize = FRAME_PREFIX_SIZE + 1;

/// Marshals a header and payload into a record body.
#[must_use]
pub fn marshal(header: &TxnHeader, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(TxnHeader::SIZE + payload.len());
    header.encode_into(&mut body);
    body.extend_from_slice(payload);
    body
}

/// Splits a record body into header and payload.
///
/// # Errors
///
/// Returns [`CoreError::LogCorruption`] if the body is shorter than a header.
pub fn unmarshal(body: &[u8]) -> CoreResult<TxnRecord> {
    let mut buf = body;
    let header = TxnHeader::decode_from(&mut buf)?;
    Ok(TxnRecord::new(header, buf.to_vec()))
}

/// Frames a record: checksum, length, body, terminator.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if the body exceeds
/// `max_record_size`.
pub fn encode_record(
    header: &TxnHeader,
    payload: &[u8],
    checksum: ChecksumKind,
    max_record_size: usize,
) -> CoreResult<Vec<u8>> {
    let body = marshal(header, payload);
    if body.len() > max_record_size {
        return Err(CoreError::invalid_argument(format!(
            "record for zxid {} is {} bytes, limit is {}",
            header.zxid,
            body.len(),
            max_record_size
        )));
    }
    let len = i32::try_from(body.len())
        .map_err(|_| CoreError::invalid_argument("record body does not fit an i32 length"))?;

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + body.len());
    frame.put_i64(checksum.compute(&body) as i64);
    frame.put_i32(len);
    frame.extend_from_slice(&body);
    frame.put_u8(RECORD_TERMINATOR);
    Ok(frame)
}

/// Decodes the checksum and length fields of a frame prefix.
#[must_use]
pub fn decode_prefix(prefix: &[u8; FRAME_PREFIX_SIZE]) -> (u64, i32) {
    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&prefix[..8]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&prefix[8..]);
    (i64::from_be_bytes(checksum) as u64, i32::from_be_bytes(len))
}
