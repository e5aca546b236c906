//! Snapshot orchestration: take, list and checkout
//!
//! [`Snapshots`] ties the archive engine to the registry for one tracked
//! root. Each operation loads the registry fresh from disk, so an instance
//! holds no state beyond its root and configuration.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── .signore                  # optional ignore patterns
//! ├── .snapshots/
//! │   ├── data.json             # registry
//! │   ├── LOCK                  # held while taking a snapshot
//! │   └── snapshot_<time>.tar.gz
//! └── checkedout_versions/
//!     └── snapshot_<id>/        # default checkout destination
//! ```
//!
//! ## Examples
//!
//! ```rust,no_run
//! use snapshot::Snapshots;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshots = Snapshots::open(Path::new("./my_project"))?;
//!
//! let record = snapshots.take("before the big refactor")?;
//! for record in snapshots.list()? {
//!     println!("{}", record.display_format());
//! }
//!
//! let restored = snapshots.checkout(&record.id, None)?;
//! println!("restored into {:?}", restored.destination);
//! # Ok(())
//! # }
//! ```

use crate::compression::CompressionLevel;
use crate::error::{Result, SnapshotError};
use crate::ignore_set::IgnoreSet;
use crate::lock::RegistryLock;
use crate::reader;
use crate::registry::Registry;
use crate::types::{CheckoutResult, SnapshotConfig, SnapshotRecord};
use crate::utils;
use crate::writer::ArchiveWriter;
use chrono::{DateTime, Local, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Snapshot operations for one tracked root
#[derive(Debug, Clone)]
pub struct Snapshots {
    root: PathBuf,
    config: SnapshotConfig,
}

impl Snapshots {
    /// Open `root` with the default configuration
    ///
    /// Creates the storage directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::PathNotFound`] if `root` does not exist
    /// - [`SnapshotError::NotADirectory`] if `root` is not a directory
    pub fn open(root: &Path) -> Result<Self> {
        SnapshotsBuilder::new().build(root)
    }

    /// Tracked root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Directory holding archives, the registry and the lock
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(&self.config.storage_dir)
    }

    /// Registry file location
    pub fn registry_path(&self) -> PathBuf {
        self.storage_dir().join(&self.config.registry_file)
    }

    /// Ignore file location
    pub fn ignore_path(&self) -> PathBuf {
        self.root.join(&self.config.ignore_file)
    }

    /// Where `checkout` restores `id` when no destination is given
    pub fn default_checkout_path(&self, id: &str) -> PathBuf {
        self.root
            .join(&self.config.checkout_dir)
            .join(format!("snapshot_{}", id))
    }

    /// Load the registry from disk
    pub fn registry(&self) -> Result<Registry> {
        Registry::load(&self.registry_path())
    }

    /// Patterns excluded from every archive
    ///
    /// The user's ignore file plus the storage and checkout directories.
    pub fn ignore_set(&self) -> Result<IgnoreSet> {
        Ok(IgnoreSet::load(&self.ignore_path())?
            .with_pattern(&self.config.storage_dir)
            .with_pattern(&self.config.checkout_dir))
    }

    /// Take a snapshot of the root
    ///
    /// Holds the registry lock for the whole operation. The registry is only
    /// written after the archive is complete; if archiving fails the registry
    /// is untouched and the partial archive file is left where it is.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::EmptyMessage`] if `message` is blank
    /// - [`SnapshotError::LockFailed`] if the registry lock cannot be taken
    /// - [`SnapshotError::WalkFailed`] / [`SnapshotError::WriteFailed`] from the writer
    /// - [`SnapshotError::Io`] / [`SnapshotError::Json`] for registry failures
    #[instrument(skip(self), fields(root = ?self.root))]
    pub fn take(&self, message: &str) -> Result<SnapshotRecord> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SnapshotError::EmptyMessage);
        }

        let storage_dir = self.storage_dir();
        fs::create_dir_all(&storage_dir)?;
        let _lock = RegistryLock::acquire(&storage_dir)?;

        let registry_path = self.registry_path();
        let mut registry = Registry::load(&registry_path)?;
        let ignore = self.ignore_set()?;

        let created_at = now_seconds();
        let id = registry.next_id(created_at);
        let (archive_path, file) = self.create_archive_file(created_at)?;
        debug!("Writing snapshot {} to {:?}", id, archive_path);

        let summary = ArchiveWriter::new(&self.root)
            .with_ignore(ignore)
            .with_compression(self.config.compression)
            .write(BufWriter::new(&file))
            .inspect_err(|e| warn!("Snapshot {} failed, leaving {:?}: {}", id, archive_path, e))?;
        // The archive must be durable before the registry points at it
        file.sync_all().map_err(SnapshotError::WriteFailed)?;
        drop(file);

        let checksum = utils::hash_file_content(&archive_path)?;
        let record = SnapshotRecord {
            id,
            message: message.to_string(),
            created_at,
            archive_path: utils::make_relative(&archive_path, &self.root)?,
            checksum: Some(checksum),
        };
        registry.put(record.clone());
        registry.persist(&registry_path)?;

        info!(
            "Took snapshot {} ({} files, {} directories)",
            record.id, summary.files, summary.directories
        );
        Ok(record)
    }

    /// All snapshots, oldest first
    pub fn list(&self) -> Result<Vec<SnapshotRecord>> {
        let registry = self.registry()?;
        Ok(registry.chronological().into_iter().cloned().collect())
    }

    /// Restore snapshot `id` into a fresh directory
    ///
    /// `destination` defaults to [`Snapshots::default_checkout_path`]; a
    /// relative destination is taken relative to the root. The destination
    /// may exist only if it is an empty directory.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::UnknownSnapshot`] if `id` is not in the registry;
    ///   nothing on disk is touched in that case
    /// - [`SnapshotError::ArchiveUnreadable`] if the archive cannot be opened
    /// - [`SnapshotError::CorruptArchive`] if the archive fails its checksum or
    ///   cannot be decoded
    /// - [`SnapshotError::DestinationNotEmpty`] if the destination holds data
    /// - [`SnapshotError::RestoreFailed`] if extraction fails
    #[instrument(skip(self), fields(root = ?self.root))]
    pub fn checkout(&self, id: &str, destination: Option<&Path>) -> Result<CheckoutResult> {
        let start = Instant::now();
        let registry = self.registry()?;
        let record = registry
            .get(id)
            .ok_or_else(|| SnapshotError::UnknownSnapshot(id.to_string()))?;

        let archive_path = record.resolve_archive(&self.root);
        let mut file = File::open(&archive_path).map_err(|source| SnapshotError::ArchiveUnreadable {
            path: archive_path.clone(),
            source,
        })?;

        if let Some(expected) = &record.checksum {
            let actual = utils::hash_reader(&mut file)?;
            if &actual != expected {
                return Err(SnapshotError::corrupt(format!(
                    "checksum mismatch for {:?}: expected {}, found {}",
                    archive_path, expected, actual
                )));
            }
            file.seek(SeekFrom::Start(0))?;
            debug!("Checksum verified for {:?}", archive_path);
        }

        let destination = match destination {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root.join(path),
            None => self.default_checkout_path(id),
        };
        ensure_fresh_destination(&destination)?;

        let summary = reader::read_archive(BufReader::new(file), &destination)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Checked out snapshot {} into {:?}", id, destination);
        Ok(CheckoutResult {
            id: id.to_string(),
            destination,
            summary,
            duration_ms,
        })
    }

    /// Create the archive file without clobbering an existing one
    fn create_archive_file(&self, created_at: DateTime<Utc>) -> Result<(PathBuf, File)> {
        let stem = format!(
            "snapshot_{}",
            created_at.with_timezone(&Local).format("%Y_%m_%d_%H_%M_%S")
        );
        let storage_dir = self.storage_dir();
        let mut attempt = 0u32;

        loop {
            let name = if attempt == 0 {
                format!("{}.tar.gz", stem)
            } else {
                format!("{}_{}.tar.gz", stem, attempt)
            };
            let path = storage_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Builder for [`Snapshots`] with a custom configuration
///
/// # Examples
///
/// ```rust,no_run
/// use snapshot::{CompressionLevel, SnapshotsBuilder};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let snapshots = SnapshotsBuilder::new()
///     .compression(CompressionLevel::Best)
///     .ignore_file(".snapignore")
///     .build(Path::new("./project"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotsBuilder {
    config: SnapshotConfig,
}

impl SnapshotsBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SnapshotConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage directory name under the root
    pub fn storage_dir(mut self, name: impl Into<String>) -> Self {
        self.config.storage_dir = name.into();
        self
    }

    /// Registry file name inside the storage directory
    pub fn registry_file(mut self, name: impl Into<String>) -> Self {
        self.config.registry_file = name.into();
        self
    }

    /// Ignore file name under the root
    pub fn ignore_file(mut self, name: impl Into<String>) -> Self {
        self.config.ignore_file = name.into();
        self
    }

    /// Default checkout directory name under the root
    pub fn checkout_dir(mut self, name: impl Into<String>) -> Self {
        self.config.checkout_dir = name.into();
        self
    }

    /// Gzip level for new archives
    pub fn compression(mut self, level: CompressionLevel) -> Self {
        self.config.compression = level;
        self
    }

    /// Find the tracked root for `start`
    ///
    /// Returns the nearest of `start` and its ancestors that already holds a
    /// storage directory, or `start` itself when none does.
    pub fn find_root(&self, start: &Path) -> PathBuf {
        start
            .ancestors()
            .find(|dir| dir.join(&self.config.storage_dir).is_dir())
            .unwrap_or(start)
            .to_path_buf()
    }

    /// Build for the root discovered from `start`
    pub fn discover(self, start: &Path) -> Result<Snapshots> {
        let root = self.find_root(start);
        debug!("Discovered snapshot root {:?} from {:?}", root, start);
        self.build(&root)
    }

    /// Build for `root`, creating its storage directory if needed
    pub fn build(self, root: &Path) -> Result<Snapshots> {
        self.config.validate()?;

        let metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::PathNotFound(root.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(SnapshotError::NotADirectory(root.to_path_buf()));
        }

        let snapshots = Snapshots {
            root: root.to_path_buf(),
            config: self.config,
        };
        fs::create_dir_all(snapshots.storage_dir())?;
        Ok(snapshots)
    }
}

fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

fn ensure_fresh_destination(destination: &Path) -> Result<()> {
    match fs::metadata(destination) {
        Ok(metadata) if metadata.is_dir() => {
            if utils::is_empty_dir(destination)? {
                Ok(())
            } else {
                Err(SnapshotError::DestinationNotEmpty(destination.to_path_buf()))
            }
        }
        Ok(_) => Err(SnapshotError::DestinationNotEmpty(destination.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
