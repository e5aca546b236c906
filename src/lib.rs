//! # Snapshot - Point-in-time directory snapshots
//!
//! Capture a directory tree as a gzip-compressed tar archive, keep a registry
//! of every capture, and restore any of them into a fresh directory.
//!
//! ## Overview
//!
//! A tracked *root* owns a storage directory (`.snapshots/` by default)
//! holding:
//! - One `snapshot_<time>.tar.gz` archive per snapshot
//! - A JSON registry (`data.json`) mapping snapshot ids to their records
//! - A `LOCK` file serializing concurrent `take` operations
//!
//! Snapshots are never modified after creation. Checking one out never
//! touches the root; the tree is restored into its own directory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapshot::Snapshots;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshots = Snapshots::open(Path::new("./my_project"))?;
//!
//! // Capture the current state
//! let record = snapshots.take("Initial state")?;
//! println!("Took snapshot {}", record.id);
//!
//! // Show history
//! for record in snapshots.list()? {
//!     print!("{}", record.display_format());
//! }
//!
//! // Restore into ./my_project/checkedout_versions/snapshot_<id>
//! let result = snapshots.checkout(&record.id, None)?;
//! println!("Restored {} files", result.summary.files);
//! # Ok(())
//! # }
//! ```
//!
//! ## Excluding Paths
//!
//! A `.signore` file at the root lists one root-relative path per line.
//! A pattern excludes the path itself and everything beneath it; there are no
//! wildcards. The storage and checkout directories are always excluded.
//!
//! ```text
//! # build output
//! target
//! node_modules
//! docs/drafts
//! ```
//!
//! ## Working With Archives Directly
//!
//! The archive engine does not depend on the registry and can stream to or
//! from any `Write`/`Read`:
//!
//! ```rust,no_run
//! use snapshot::{read_archive, write_archive, IgnoreSet};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = Vec::new();
//! let ignore = IgnoreSet::from_patterns(["target"]);
//! write_archive(Path::new("./project"), &ignore, &mut buffer)?;
//!
//! read_archive(buffer.as_slice(), Path::new("./restored"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SnapshotError>`. Archive damage, whether
//! a checksum mismatch or an undecodable stream, is reported as
//! [`SnapshotError::CorruptArchive`]; [`SnapshotError::user_message`] adds a
//! hint suitable for display.
//!
//! ## Module Organization
//!
//! - [`snapshots`]: Take, list and checkout for one root
//! - [`writer`] / [`reader`]: The archive engine
//! - [`registry`]: The JSON snapshot index
//! - [`ignore_set`]: Path exclusion rules
//! - [`compression`]: Gzip levels
//! - [`types`]: Records, summaries and configuration
//! - [`error`]: Error types and handling

// Public API modules
pub mod compression;
pub mod error;
pub mod ignore_set;
pub mod lock;
pub mod reader;
pub mod registry;
pub mod snapshots;
pub mod types;
pub mod writer;

// Internal modules
mod utils;

// Re-export main types for convenience
pub use compression::CompressionLevel;
pub use error::{Result, SnapshotError};
pub use ignore_set::IgnoreSet;
pub use reader::read_archive;
pub use registry::Registry;
pub use snapshots::{Snapshots, SnapshotsBuilder};
pub use types::*;
pub use writer::{write_archive, ArchiveWriter};
