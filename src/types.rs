//! Core data types used throughout the snapshot library
//!
//! ## Overview
//!
//! - **Registry data**: [`SnapshotRecord`] - one completed snapshot
//! - **Archive data**: [`ArchiveEntry`], [`EntryKind`] - transient records
//!   produced by the walk and consumed by restore
//! - **Results**: [`ArchiveSummary`], [`RestoreSummary`], [`CheckoutResult`]
//! - **Configuration**: [`SnapshotConfig`]

use crate::compression::CompressionLevel;
use crate::error::{Result, SnapshotError};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One completed snapshot
///
/// # Examples
///
/// ```rust
/// use snapshot::types::SnapshotRecord;
/// use chrono::DateTime;
/// use std::path::PathBuf;
///
/// let record = SnapshotRecord {
///     id: "65a1b2c3".to_string(),
///     message: "before refactor".to_string(),
///     created_at: DateTime::from_timestamp(1_705_095_875, 0).unwrap(),
///     archive_path: PathBuf::from(".snapshots/snapshot_2024_01_12_21_44_35.tar.gz"),
///     checksum: None,
/// };
/// assert!(record.display_format().contains("before refactor"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Unique identifier within the registry
    pub id: String,
    /// User-supplied annotation
    pub message: String,
    /// Creation instant, seconds resolution
    pub created_at: DateTime<Utc>,
    /// Archive location, relative to the tracked root unless absolute
    pub archive_path: PathBuf,
    /// SHA-256 of the archive file, when recorded
    pub checksum: Option<String>,
}

impl SnapshotRecord {
    /// Resolve the archive location against the tracked root
    pub fn resolve_archive(&self, root: &Path) -> PathBuf {
        if self.archive_path.is_absolute() {
            self.archive_path.clone()
        } else {
            root.join(&self.archive_path)
        }
    }

    /// Creation time formatted for log output, in local time
    pub fn formatted_date(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%a %b %e %H:%M:%S %Y")
            .to_string()
    }

    /// Render the human-readable log block for this snapshot
    pub fn display_format(&self) -> String {
        format_log_entry(&self.id, self.formatted_date(), &self.message)
    }
}

/// Lay out one log block from already rendered parts
///
/// [`SnapshotRecord::display_format`] passes plain values; callers that
/// decorate the parts (colour, for instance) get the same layout.
pub fn format_log_entry(id: impl fmt::Display, date: impl fmt::Display, message: impl fmt::Display) -> String {
    format!("Snapshot Id:\t{}\nDate:\t{}\n\n\t{}\n", id, date, message)
}

/// Type of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file with content
    File,
    /// Directory, no content
    Directory,
}

/// One tar-style record, never persisted on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root, normal components only
    pub path: PathBuf,
    /// Permission bits
    pub mode: u32,
    /// Entry type
    pub kind: EntryKind,
    /// Content length in bytes (0 for directories)
    pub size: u64,
}

/// Counts reported by the archive writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Regular files written
    pub files: usize,
    /// Directories written
    pub directories: usize,
    /// Total file content bytes (uncompressed)
    pub bytes: u64,
    /// Entries in emission order
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveSummary {
    /// Number of entries written
    pub fn entry_count(&self) -> usize {
        self.files + self.directories
    }
}

/// Counts reported by the archive reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Regular files created
    pub files: usize,
    /// Directories created or reused
    pub directories: usize,
    /// Total bytes written
    pub bytes: u64,
    /// Entries of unsupported type that were skipped
    pub skipped: usize,
}

/// Result of a checkout operation
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    /// Snapshot that was restored
    pub id: String,
    /// Directory holding the restored tree
    pub destination: PathBuf,
    /// Extraction counts
    pub summary: RestoreSummary,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Layout and compression settings for one tracked root
///
/// # Examples
///
/// ```rust
/// use snapshot::types::SnapshotConfig;
///
/// let config = SnapshotConfig::default();
/// assert_eq!(config.storage_dir, ".snapshots");
/// assert_eq!(config.registry_file, "data.json");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory under the root holding archives and the registry
    pub storage_dir: String,
    /// Registry file name inside the storage directory
    pub registry_file: String,
    /// Ignore file name under the root
    pub ignore_file: String,
    /// Directory under the root receiving default checkouts
    pub checkout_dir: String,
    /// Gzip level for new archives
    pub compression: CompressionLevel,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            storage_dir: ".snapshots".to_string(),
            registry_file: "data.json".to_string(),
            ignore_file: ".signore".to_string(),
            checkout_dir: "checkedout_versions".to_string(),
            compression: CompressionLevel::default(),
        }
    }
}

impl SnapshotConfig {
    /// Check that every name is a single plain path component
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("storage_dir", &self.storage_dir),
            ("registry_file", &self.registry_file),
            ("ignore_file", &self.ignore_file),
            ("checkout_dir", &self.checkout_dir),
        ] {
            if value.is_empty()
                || value == "."
                || value == ".."
                || value.contains('/')
                || value.contains('\\')
            {
                return Err(SnapshotError::InvalidConfiguration(format!(
                    "{} must be a plain file name, got '{}'",
                    field, value
                )));
            }
        }
        self.compression.validate()
    }
}
