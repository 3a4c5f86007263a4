//! zkpersist CLI
//!
//! Command-line tools for inspecting and maintaining a server's
//! transaction logs and snapshots.
//!
//! # Commands
//!
//! - `inspect` - List log segments and snapshots
//! - `dump-log` - Print log records for debugging
//! - `verify` - Check every record and snapshot checksum
//! - `purge` - Remove snapshots and segments no longer needed

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zkpersist_core::{files, ChecksumKind, Config, Zxid};

/// zkpersist command-line tools.
#[derive(Parser)]
#[command(name = "zkpersist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (holds `version-2/`)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Separate transaction log directory, if logs are not kept under --path
    #[arg(global = true, long)]
    log_dir: Option<PathBuf>,

    /// Checksum algorithm the files were written with
    #[arg(global = true, long, value_enum, default_value_t = ChecksumArg::Adler32)]
    checksum: ChecksumArg,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChecksumArg {
    Adler32,
    Crc32,
}

impl From<ChecksumArg> for ChecksumKind {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Adler32 => Self::Adler32,
            ChecksumArg::Crc32 => Self::Crc32,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List log segments and snapshots
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print log records for debugging
    DumpLog {
        /// First zxid to print, in hex (e.g. 0x100000001)
        #[arg(short, long, value_parser = parse_zxid)]
        since: Option<Zxid>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every record and snapshot checksum
    Verify,

    /// Remove snapshots and log segments no longer needed for recovery
    Purge {
        /// Number of snapshots to keep (at least 3)
        #[arg(short, long, default_value = "3")]
        retain: usize,
    },

    /// Show version information
    Version,
}

/// Parses a zxid written in hex, with or without a `0x` prefix.
fn parse_zxid(s: &str) -> Result<Zxid, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    Zxid::from_hex(digits).ok_or_else(|| format!("invalid zxid {s:?}, expected hex"))
}

/// Resolved on-disk locations for a command.
struct Dirs {
    log_dir: PathBuf,
    snap_dir: PathBuf,
}

fn resolve(cli: &Cli, command: &str) -> Result<(Dirs, Config), Box<dyn std::error::Error>> {
    let path = cli
        .path
        .clone()
        .ok_or_else(|| format!("Data directory required for {command}"))?;
    let mut config = Config::new(&path).checksum(cli.checksum.into());
    if let Some(log_dir) = &cli.log_dir {
        config = config.log_dir(log_dir);
    }
    let dirs = Dirs {
        log_dir: files::version_dir(&config.log_dir),
        snap_dir: files::version_dir(&config.snap_dir),
    };
    debug!(
        command,
        log_dir = %dirs.log_dir.display(),
        snap_dir = %dirs.snap_dir.display(),
        "resolved data directories"
    );
    Ok((dirs, config))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Inspect { format } => {
            let (dirs, _) = resolve(&cli, "inspect")?;
            commands::inspect::run(&dirs.log_dir, &dirs.snap_dir, format)?;
        }
        Commands::DumpLog {
            since,
            limit,
            format,
        } => {
            let (dirs, config) = resolve(&cli, "dump-log")?;
            let since = since.unwrap_or(Zxid::NONE);
            commands::dump_log::run(&dirs.log_dir, &config, since, *limit, format)?;
        }
        Commands::Verify => {
            let (dirs, config) = resolve(&cli, "verify")?;
            commands::verify::run(&dirs.log_dir, &dirs.snap_dir, &config)?;
        }
        Commands::Purge { retain } => {
            let (dirs, _) = resolve(&cli, "purge")?;
            commands::purge::run(&dirs.log_dir, &dirs.snap_dir, *retain)?;
        }
        Commands::Version => {
            println!("zkpersist CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("zkpersist Core v{}", zkpersist_core::VERSION);
            println!("On-disk format version {}", zkpersist_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
