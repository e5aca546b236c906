//! Error types for the snapshot library
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error
//! side is [`SnapshotError`]. Variants carry the offending path wherever one is
//! known so that the CLI can name it in its output.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the snapshot library
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Main error type for all snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The directory to archive does not exist
    #[error("Path not found: {0:?}")]
    PathNotFound(PathBuf),

    /// The directory to archive is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Directory traversal failed while building an archive
    #[error("Failed to walk {path:?}: {source}")]
    WalkFailed {
        /// Entry that could not be visited or read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing the archive stream failed
    #[error("Failed to write archive: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// The archive stream is malformed, truncated, or fails verification
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Creating a file or directory during restore failed
    #[error("Restore failed at {path:?}: {source}")]
    RestoreFailed {
        /// Path that could not be created or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No snapshot with this id exists in the registry
    #[error("Unknown snapshot: {0}")]
    UnknownSnapshot(String),

    /// The archive file of a known snapshot cannot be opened
    #[error("Archive unreadable: {path:?}: {source}")]
    ArchiveUnreadable {
        /// Archive location recorded in the registry
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O errors during registry and storage operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization of the registry
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot was requested without a message
    #[error("Snapshot message must not be empty")]
    EmptyMessage,

    /// Checkout destination already holds data
    #[error("Destination is not empty: {0:?}")]
    DestinationNotEmpty(PathBuf),

    /// The registry lock could not be acquired
    #[error("Failed to lock registry at {path:?}: {source}")]
    LockFailed {
        /// Lock file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SnapshotError {
    /// Create a corrupt-archive error with a custom message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        SnapshotError::CorruptArchive(msg.into())
    }

    /// Create a restore error for `path`
    pub fn restore_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SnapshotError::RestoreFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a walk error for `path`
    pub fn walk_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SnapshotError::WalkFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if this error indicates a damaged archive
    pub fn is_corruption(&self) -> bool {
        matches!(self, SnapshotError::CorruptArchive(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            SnapshotError::UnknownSnapshot(id) => {
                format!("Snapshot '{}' not found. Use 'snapshot logs' to see available snapshots.", id)
            }
            SnapshotError::EmptyMessage => {
                "A message is required. Usage: snapshot take <message>".to_string()
            }
            SnapshotError::DestinationNotEmpty(path) => {
                format!(
                    "Destination {:?} already contains files. Choose another destination or remove it first.",
                    path
                )
            }
            SnapshotError::LockFailed { path, .. } => {
                format!(
                    "Could not lock {:?}. Another snapshot may be in progress. Try again later.",
                    path
                )
            }
            _ => self.to_string(),
        }
    }
}
