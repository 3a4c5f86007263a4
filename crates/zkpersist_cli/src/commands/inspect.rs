//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use zkpersist_core::files::{self, LOG_PREFIX, SNAPSHOT_PREFIX};
use zkpersist_core::{FileHeader, FileSnap};
use zkpersist_storage::{FileBackend, StorageBackend};

use super::format_size;

/// Directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub log_dir: String,
    /// Snapshot directory.
    pub snap_dir: String,
    /// Log segments, oldest first.
    pub segments: Vec<SegmentInfo>,
    /// Snapshots, newest first.
    pub snapshots: Vec<SnapshotInfo>,
    /// Total bytes of segments and snapshots.
    pub total_size: u64,
}

/// One log segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// File name.
    pub name: String,
    /// Zxid of the first record, in hex.
    pub start_zxid: String,
    /// File size including preallocated padding.
    pub size: u64,
    /// dbid from the header, if the header is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbid: Option<i64>,
}

/// One snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotInfo {
    /// File name.
    pub name: String,
    /// Zxid the snapshot reflects, in hex.
    pub zxid: String,
    /// File size.
    pub size: u64,
    /// Whether the file passes the structural check.
    pub complete: bool,
}

/// Runs the inspect command.
pub fn run(log_dir: &Path, snap_dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !log_dir.exists() && !snap_dir.exists() {
        return Err(format!("No data found at {}", log_dir.display()).into());
    }

    let result = inspect(log_dir, snap_dir)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects segment and snapshot metadata.
pub fn inspect(log_dir: &Path, snap_dir: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut result = InspectResult {
        log_dir: log_dir.display().to_string(),
        snap_dir: snap_dir.display().to_string(),
        segments: Vec::new(),
        snapshots: Vec::new(),
        total_size: 0,
    };

    for (zxid, path) in files::sorted_files(log_dir, LOG_PREFIX, true)? {
        let backend = FileBackend::open_read_only(&path)?;
        let size = backend.size()?;
        let dbid = if size >= FileHeader::SIZE as u64 {
            FileHeader::decode(&backend.read_at(0, FileHeader::SIZE)?).map(|h| h.dbid)
        } else {
            None
        };
        result.total_size += size;
        result.segments.push(SegmentInfo {
            name: file_name(&path),
            start_zxid: format!("{zxid}"),
            size,
            dbid,
        });
    }

    for (zxid, path) in files::sorted_files(snap_dir, SNAPSHOT_PREFIX, false)? {
        let size = std::fs::metadata(&path)?.len();
        result.total_size += size;
        result.snapshots.push(SnapshotInfo {
            name: file_name(&path),
            zxid: format!("{zxid}"),
            size,
            complete: FileSnap::is_valid_snapshot(&path)?,
        });
    }

    Ok(result)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_text_output(result: &InspectResult) {
    println!("zkpersist Data Inspection");
    println!("=========================");
    println!();
    println!("Log directory:      {}", result.log_dir);
    println!("Snapshot directory: {}", result.snap_dir);
    println!();
    println!("Log segments ({}):", result.segments.len());
    for segment in &result.segments {
        let dbid = segment
            .dbid
            .map_or_else(|| "?".to_string(), |d| d.to_string());
        println!(
            "  {:<24} start {:<20} {:>10}  dbid {}",
            segment.name,
            segment.start_zxid,
            format_size(segment.size),
            dbid
        );
    }
    println!();
    println!("Snapshots ({}):", result.snapshots.len());
    for snapshot in &result.snapshots {
        let status = if snapshot.complete { "" } else { "  (incomplete)" };
        println!(
            "  {:<24} zxid {:<20} {:>10}{}",
            snapshot.name,
            snapshot.zxid,
            format_size(snapshot.size),
            status
        );
    }
    println!();
    println!("Total size: {}", format_size(result.total_size));
}
