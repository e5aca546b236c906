//! Snapshot registry: the durable index of snapshots for one root
//!
//! The registry is a single JSON file mapping snapshot id to its record:
//!
//! ```json
//! {
//!   "65a1b2c3": {
//!     "Message": "before refactor",
//!     "Timestamp": 1705095875,
//!     "FileName": ".snapshots/snapshot_2024_01_12_21_44_35.tar.gz",
//!     "Checksum": "9f86d0…"
//!   }
//! }
//! ```
//!
//! `Checksum` is optional so registries written without it still load.
//!
//! The whole file is read on [`Registry::load`] and rewritten on
//! [`Registry::persist`]; persistence goes through a temporary file and a
//! rename, so a crash mid-write leaves the previous registry intact.
//! Concurrent writers are serialized by the orchestrator's lock, not here.

use crate::error::Result;
use crate::types::SnapshotRecord;
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk shape of one record; the id is the enclosing map key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Timestamp", with = "chrono::serde::ts_seconds")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "FileName")]
    file_name: PathBuf,
    #[serde(rename = "Checksum", default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl StoredRecord {
    fn into_record(self, id: String) -> SnapshotRecord {
        SnapshotRecord {
            id,
            message: self.message,
            created_at: self.timestamp,
            archive_path: self.file_name,
            checksum: self.checksum,
        }
    }
}

impl From<&SnapshotRecord> for StoredRecord {
    fn from(record: &SnapshotRecord) -> Self {
        Self {
            message: record.message.clone(),
            timestamp: record.created_at,
            file_name: record.archive_path.clone(),
            checksum: record.checksum.clone(),
        }
    }
}

/// In-memory map of snapshot id to record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    records: BTreeMap<String, SnapshotRecord>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry stored at `path`
    ///
    /// A missing or empty file yields an empty registry.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Io`](crate::SnapshotError::Io) if the file exists but cannot be read
    /// - [`SnapshotError::Json`](crate::SnapshotError::Json) if its content is not a valid registry
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No registry at {:?}, starting empty", path);
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Self::new());
        }

        let stored: BTreeMap<String, StoredRecord> = serde_json::from_str(&contents)?;
        let records = stored
            .into_iter()
            .map(|(id, record)| {
                let record = record.into_record(id.clone());
                (id, record)
            })
            .collect::<BTreeMap<_, _>>();

        debug!("Loaded {} snapshot records from {:?}", records.len(), path);
        Ok(Self { records })
    }

    /// Write the whole registry to `path`, replacing any previous content
    pub fn persist(&self, path: &Path) -> Result<()> {
        let stored: BTreeMap<&str, StoredRecord> = self
            .records
            .iter()
            .map(|(id, record)| (id.as_str(), StoredRecord::from(record)))
            .collect();

        let json = serde_json::to_vec_pretty(&stored)?;
        utils::atomic_write(path, &json)?;

        info!("Persisted {} snapshot records to {:?}", self.records.len(), path);
        Ok(())
    }

    /// Insert a record, replacing any record with the same id
    pub fn put(&mut self, record: SnapshotRecord) -> Option<SnapshotRecord> {
        self.records.insert(record.id.clone(), record)
    }

    /// Look up a record by id
    pub fn get(&self, id: &str) -> Option<&SnapshotRecord> {
        self.records.get(id)
    }

    /// Whether a record with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All `(id, record)` pairs, ordered by id
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// Records sorted by creation time
    pub fn chronological(&self) -> Vec<&SnapshotRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        // Same-second ids differ only by their "-n" suffix
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.len().cmp(&b.id.len()))
                .then(a.id.cmp(&b.id))
        });
        records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pick an id for a snapshot created at `created_at`
    ///
    /// The id is the lowercase hex of the unix second. When that id is taken,
    /// `-1`, `-2`, … is appended until a free one is found.
    pub fn next_id(&self, created_at: DateTime<Utc>) -> String {
        let base = format!("{:x}", created_at.timestamp());
        if !self.contains(&base) {
            return base;
        }
        (1u32..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or(base)
    }
}
