//! Purge command implementation.

use std::path::Path;
use zkpersist_core::retention;

/// Runs the purge command.
pub fn run(log_dir: &Path, snap_dir: &Path, retain: usize) -> Result<(), Box<dyn std::error::Error>> {
    let report = retention::purge(log_dir, snap_dir, retain)?;

    if !report.oldest_retained.is_valid() {
        println!("No valid snapshots found, nothing purged");
        return Ok(());
    }

    println!("Oldest retained snapshot: {}", report.oldest_retained);
    println!("Removed {} snapshot(s):", report.removed_snapshots.len());
    for path in &report.removed_snapshots {
        println!("  {}", path.display());
    }
    println!("Removed {} log segment(s):", report.removed_logs.len());
    for path in &report.removed_logs {
        println!("  {}", path.display());
    }
    Ok(())
}
