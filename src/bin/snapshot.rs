//! # Snapshot CLI
//!
//! Command-line front end for the snapshot library.
//!
//! ## Usage
//! ```bash
//! # Capture the current directory
//! snapshot take "before refactor"
//!
//! # Show history
//! snapshot logs
//!
//! # Restore into checkedout_versions/snapshot_<id>
//! snapshot checkout <id>
//!
//! # Restore somewhere else
//! snapshot checkout <id> /tmp/restored
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use snapshot::{format_log_entry, CompressionLevel, Snapshots, SnapshotsBuilder};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Snapshot CLI - point-in-time copies of a directory
#[derive(Parser)]
#[command(name = "snapshot")]
#[command(version)]
#[command(about = "Take, list and check out directory snapshots")]
#[command(long_about = None)]
struct Cli {
    /// Directory to start root discovery from (defaults to current)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a snapshot of the tracked directory
    Take {
        /// Message describing the snapshot
        message: String,

        /// Gzip level: none, fast, default, best or 0-9
        #[arg(short, long, default_value = "default")]
        compression: CompressionLevel,
    },

    /// List snapshots, oldest first
    Logs,

    /// Restore a snapshot into a fresh directory
    Checkout {
        /// Snapshot id as shown by `logs`
        id: String,

        /// Destination directory (defaults to checkedout_versions/snapshot_<id>)
        destination: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<snapshot::SnapshotError>() {
            Some(err) => err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Install the fmt subscriber; `RUST_LOG` takes precedence over `--verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let start = match cli.path {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => cwd.clone(),
    };

    let builder = match &cli.command {
        Commands::Take { compression, .. } => SnapshotsBuilder::new().compression(*compression),
        _ => SnapshotsBuilder::new(),
    };
    let snapshots = builder
        .discover(&start)
        .with_context(|| format!("Failed to open snapshot root from {}", start.display()))?;

    match cli.command {
        Commands::Take { message, .. } => cmd_take(&snapshots, &message),
        Commands::Logs => cmd_logs(&snapshots),
        Commands::Checkout { id, destination } => {
            // Relative destinations are relative to where the user is standing
            let destination = destination.map(|d| if d.is_absolute() { d } else { cwd.join(d) });
            cmd_checkout(&snapshots, &id, destination.as_deref())
        }
    }
}

/// Take a snapshot
fn cmd_take(snapshots: &Snapshots, message: &str) -> anyhow::Result<()> {
    let start = Instant::now();
    let record = snapshots.take(message)?;
    let duration = start.elapsed();

    println!("{} Took snapshot {}", "✓".green().bold(), record.id.yellow().bold());
    println!("  Message: {}", record.message.cyan());
    println!("  Archive: {}", record.archive_path.display().to_string().cyan());
    println!("  Time: {}", format_duration(round_millis(duration)).to_string().cyan());

    Ok(())
}

/// Print every snapshot in log format
///
/// Snapshots are shown oldest first, one block per snapshot.
fn cmd_logs(snapshots: &Snapshots) -> anyhow::Result<()> {
    let records = snapshots.list()?;

    if records.is_empty() {
        println!("{}", "No snapshots found.".yellow());
        return Ok(());
    }

    for record in &records {
        print!(
            "{}",
            format_log_entry(
                record.id.yellow().bold(),
                record.formatted_date(),
                record.message.cyan()
            )
        );
    }

    Ok(())
}

/// Restore a snapshot
fn cmd_checkout(snapshots: &Snapshots, id: &str, destination: Option<&Path>) -> anyhow::Result<()> {
    println!("{} {}", "Checking out snapshot".blue().bold(), id.yellow());

    let result = snapshots.checkout(id, destination)?;

    println!("{} Checkout complete", "✓".green().bold());
    println!("  Destination: {}", result.destination.display().to_string().cyan());
    println!("  Files restored: {}", result.summary.files.to_string().cyan());
    println!("  Directories: {}", result.summary.directories.to_string().cyan());
    println!("  Bytes written: {}", format_bytes(result.summary.bytes).cyan());
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(result.duration_ms)).to_string().cyan()
    );

    Ok(())
}

fn round_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// Format bytes in human-readable form
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
