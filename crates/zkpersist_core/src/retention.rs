//! Removal of snapshots and log segments no longer needed for recovery.
//!
//! When to purge and how many snapshots to keep is the caller's decision.
//! Purging keeps the newest `retain` valid snapshots and every segment that
//! may hold records after the oldest of them; everything older goes.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::files::{self, LOG_PREFIX, SNAPSHOT_PREFIX};
use crate::snapshot::FileSnap;
use crate::types::Zxid;

/// Fewest snapshots a purge may keep.
pub const MIN_SNAPSHOTS_RETAINED: usize = 3;

/// What a purge kept and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    /// Zxid of the oldest snapshot kept, or [`Zxid::NONE`] if nothing
    /// was purged.
    pub oldest_retained: Zxid,
    /// Snapshot files removed.
    pub removed_snapshots: Vec<PathBuf>,
    /// Log segments removed.
    pub removed_logs: Vec<PathBuf>,
}

impl PurgeReport {
    fn new(oldest_retained: Zxid) -> Self {
        Self {
            oldest_retained,
            removed_snapshots: Vec::new(),
            removed_logs: Vec::new(),
        }
    }
}

/// Deletes snapshots older than the `retain` newest valid ones, and the log
/// segments that only hold records before the oldest retained snapshot.
///
/// `log_dir` and `snap_dir` are the directories holding the files (the
/// `version-2` directories).
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if `retain` is below
/// [`MIN_SNAPSHOTS_RETAINED`], or an I/O error if a file cannot be removed.
pub fn purge(log_dir: &Path, snap_dir: &Path, retain: usize) -> CoreResult<PurgeReport> {
    if retain < MIN_SNAPSHOTS_RETAINED {
        return Err(CoreError::invalid_argument(format!(
            "must retain at least {MIN_SNAPSHOTS_RETAINED} snapshots, got {retain}"
        )));
    }

    let mut kept = Vec::new();
    for (zxid, path) in files::sorted_files(snap_dir, SNAPSHOT_PREFIX, false)? {
        if kept.len() >= retain {
            break;
        }
        if FileSnap::is_valid_snapshot(&path)? {
            kept.push(zxid);
        }
    }
    let Some(&oldest_retained) = kept.last() else {
        debug!(dir = %snap_dir.display(), "no valid snapshots, nothing to purge");
        return Ok(PurgeReport::new(Zxid::NONE));
    };

    let logs = files::sorted_files(log_dir, LOG_PREFIX, true)?;
    let needed: HashSet<PathBuf> = files::log_files_covering(&logs, oldest_retained)
        .into_iter()
        .map(|(_, path)| path)
        .collect();

    let mut report = PurgeReport::new(oldest_retained);
    for (start, path) in logs {
        if start < oldest_retained && !needed.contains(&path) {
            fs::remove_file(&path)?;
            report.removed_logs.push(path);
        }
    }
    for (zxid, path) in files::sorted_files(snap_dir, SNAPSHOT_PREFIX, true)? {
        if zxid < oldest_retained {
            fs::remove_file(&path)?;
            report.removed_snapshots.push(path);
        }
    }

    files::sync_dir(log_dir)?;
    files::sync_dir(snap_dir)?;
    info!(
        oldest_retained = %oldest_retained,
        removed_snapshots = report.removed_snapshots.len(),
        removed_logs = report.removed_logs.len(),
        "purged old snapshots and logs"
    );
    Ok(report)
}
