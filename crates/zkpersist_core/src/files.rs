//! On-disk naming and directory helpers.
//!
//! ```text
//! <log_dir>/version-2/
//! ├─ log.1             # segment whose first record has zxid 0x1
//! ├─ log.1f4           # next segment, first zxid 0x1f4
//! <snap_dir>/version-2/
//! ├─ snapshot.0
//! └─ snapshot.1f3      # state as of zxid 0x1f3
//! ```
//!
//! File names embed a zxid in lower-case hex with no prefix or padding.
//! Anything whose suffix does not parse as hex (temp files, editor
//! backups) is ignored by every listing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreResult;
use crate::types::Zxid;

/// Prefix of log segment files.
pub const LOG_PREFIX: &str = "log";

/// Prefix of snapshot files.
pub const SNAPSHOT_PREFIX: &str = "snapshot";

/// Sub-directory holding files of the current format version.
pub const VERSION_DIR: &str = "version-2";

/// Returns `<base>/version-2`.
#[must_use]
pub fn version_dir(base: &Path) -> PathBuf {
    base.join(VERSION_DIR)
}

/// Name of the log segment starting at `zxid`.
#[must_use]
pub fn log_file_name(zxid: Zxid) -> String {
    format!("{LOG_PREFIX}.{}", zxid.to_hex())
}

/// Name of the snapshot reflecting `zxid`.
#[must_use]
pub fn snapshot_file_name(zxid: Zxid) -> String {
    format!("{SNAPSHOT_PREFIX}.{}", zxid.to_hex())
}

/// Extracts the zxid from `<prefix>.<hex>`.
#[must_use]
pub fn zxid_from_name(name: &str, prefix: &str) -> Option<Zxid> {
    let (head, tail) = name.split_once('.')?;
    if head != prefix {
        return None;
    }
    Zxid::from_hex(tail)
}

/// Extracts the zxid from the file name of `path`.
#[must_use]
pub fn zxid_from_path(path: &Path, prefix: &str) -> Option<Zxid> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| zxid_from_name(n, prefix))
}

/// Lists `<prefix>.<hex>` files in `dir`, sorted by zxid.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn sorted_files(dir: &Path, prefix: &str, ascending: bool) -> CoreResult<Vec<(Zxid, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(zxid) = zxid_from_name(name, prefix) {
            files.push((zxid, entry.path()));
        }
    }

    files.sort_by_key(|(zxid, _)| *zxid);
    if !ascending {
        files.reverse();
    }
    Ok(files)
}

/// Picks the segments that can hold records with zxid >= `zxid`.
///
/// `segments` must be sorted ascending. The result holds every segment
/// starting at or after `zxid`, preceded by the newest segment starting
/// before it, since that one may contain `zxid` itself.
#[must_use]
pub fn log_files_covering(segments: &[(Zxid, PathBuf)], zxid: Zxid) -> Vec<(Zxid, PathBuf)> {
    let split = segments.partition_point(|(start, _)| *start < zxid);
    let first = split.saturating_sub(1);
    segments[first..].to_vec()
}

/// Fsyncs a directory so file creations, renames and deletions are durable.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or synced.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> CoreResult<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directory fsync is not available on this platform; the filesystem
/// journal covers metadata durability.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> CoreResult<()> {
    Ok(())
}
