//! Byte-level damage to files on disk.

use std::fs::{self, OpenOptions};
use std::path::Path;

/// Inverts every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: usize) {
    let mut raw = fs::read(path).expect("Failed to read file");
    assert!(offset < raw.len(), "offset {offset} past end of {}", path.display());
    raw[offset] ^= 0xFF;
    fs::write(path, raw).expect("Failed to write file");
}

/// Cuts the file to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_len(len).expect("Failed to truncate file");
}

/// Drops the last `count` bytes of the file.
pub fn chop_tail(path: &Path, count: u64) {
    let len = fs::metadata(path).expect("Failed to stat file").len();
    truncate_file(path, len.saturating_sub(count));
}

/// Overwrites bytes starting at `offset`.
pub fn overwrite(path: &Path, offset: usize, bytes: &[u8]) {
    let mut raw = fs::read(path).expect("Failed to read file");
    let end = offset + bytes.len();
    if raw.len() < end {
        raw.resize(end, 0);
    }
    raw[offset..end].copy_from_slice(bytes);
    fs::write(path, raw).expect("Failed to write file");
}
