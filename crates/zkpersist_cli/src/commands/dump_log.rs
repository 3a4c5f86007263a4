//! Dump log command implementation.

use serde::Serialize;
use std::path::Path;
use zkpersist_core::{Config, FileTxnIterator, TxnRecord, Zxid};

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Zxid in hex.
    pub zxid: String,
    /// Leader epoch part of the zxid.
    pub epoch: u32,
    /// Counter part of the zxid.
    pub counter: u32,
    /// Session that issued the request.
    pub session_id: String,
    /// Client sequence number.
    pub client_seq: i32,
    /// Request time in milliseconds since the epoch.
    pub time: i64,
    /// Operation type.
    pub op_type: i32,
    /// Payload size in bytes.
    pub payload_size: usize,
}

impl From<&TxnRecord> for RecordInfo {
    fn from(record: &TxnRecord) -> Self {
        let header = &record.header;
        Self {
            zxid: format!("{}", header.zxid),
            epoch: header.zxid.epoch(),
            counter: header.zxid.counter(),
            session_id: format!("{:#x}", header.session_id),
            client_seq: header.client_seq,
            time: header.time,
            op_type: header.op_type,
            payload_size: record.payload.len(),
        }
    }
}

/// Runs the dump-log command.
pub fn run(
    log_dir: &Path,
    config: &Config,
    since: Zxid,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !log_dir.exists() {
        return Err(format!("Log directory not found: {}", log_dir.display()).into());
    }

    let records = read_records(log_dir, config, since, limit)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records with zxid >= `since`.
pub fn read_records(
    log_dir: &Path,
    config: &Config,
    since: Zxid,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let iter = FileTxnIterator::open(log_dir, since, config.checksum, config.max_record_size)?;
    let max_records = limit.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    for record in iter.take(max_records) {
        records.push(RecordInfo::from(&record?));
    }
    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Log Records ({} total)", records.len());
    println!("{}", "=".repeat(60));

    for record in records {
        println!(
            "{:<20} session {:<18} cxid {:<6} type {:<4} time {:<14} {} bytes",
            record.zxid,
            record.session_id,
            record.client_seq,
            record.op_type,
            record.time,
            record.payload_size
        );
    }
}
