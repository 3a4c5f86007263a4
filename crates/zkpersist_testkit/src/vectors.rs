//! On-disk format test vectors.
//!
//! Hex encodings of headers and record frames that any implementation of
//! the format must produce byte for byte. Exported as JSON for tools in
//! other languages.

use serde::{Deserialize, Serialize};

/// A named input and its expected encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded), empty when the input is described only.
    pub input_hex: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
}

/// Body used by the record vectors: session 0x1234, cxid 7, zxid
/// 0x100000001, time 1700000000000, type 1, payload "hello".
pub const RECORD_BODY_HEX: &str =
    "00000000000012340000000700000001000000010000018bcfe568000000000168656c6c6f";

/// File header vectors.
pub fn header_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "log_header".into(),
            description: "Log segment header, dbid 7".into(),
            input_hex: String::new(),
            expected_hex: "5a4b4c47000000020000000000000007".into(),
        },
        TestVector {
            id: "snapshot_header".into(),
            description: "Snapshot header, dbid -1".into(),
            input_hex: String::new(),
            expected_hex: "5a4b534e00000002ffffffffffffffff".into(),
        },
    ]
}

/// Record frame vectors.
pub fn record_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "frame_adler32".into(),
            description: "Record frame checksummed with Adler-32".into(),
            input_hex: RECORD_BODY_HEX.into(),
            expected_hex: "0000000030d6050d00000025\
                00000000000012340000000700000001000000010000018bcfe568000000000168656c6c6f42"
                .into(),
        },
        TestVector {
            id: "frame_crc32".into(),
            description: "Record frame checksummed with CRC-32".into(),
            input_hex: RECORD_BODY_HEX.into(),
            expected_hex: "00000000d906ad2200000025\
                00000000000012340000000700000001000000010000018bcfe568000000000168656c6c6f42"
                .into(),
        },
    ]
}

/// Snapshot trailer vectors.
pub fn snapshot_tail_vectors() -> Vec<TestVector> {
    vec![TestVector {
        id: "snapshot_tail".into(),
        description: "Bytes after the snapshot checksum".into(),
        input_hex: String::new(),
        expected_hex: "000000012f".into(),
    }]
}

/// Generate all test vectors as JSON for cross-language use.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        header: header_vectors(),
        record: record_vectors(),
        snapshot_tail: snapshot_tail_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    header: Vec<TestVector>,
    record: Vec<TestVector>,
    snapshot_tail: Vec<TestVector>,
}

/// Decodes a hex string.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// Encodes bytes as lower-case hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
