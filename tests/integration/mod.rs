//! Integration tests for the snapshot workflow
//!
//! Drives take, list and checkout end to end against real directories.

use ::snapshot::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Test harness owning a tracked root
pub struct SnapshotTestHarness {
    pub root: TempDir,
    pub snapshots: Snapshots,
}

impl SnapshotTestHarness {
    /// Create a harness with an empty root
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let snapshots = SnapshotsBuilder::new()
            .compression(CompressionLevel::Fast)
            .build(root.path())
            .unwrap();
        Self { root, snapshots }
    }

    /// Create a harness with `{a.txt: "hi", sub/b.txt: "bye"}`
    pub fn with_sample_tree() -> Self {
        let harness = Self::new();
        harness.write_file("a.txt", "hi");
        harness.write_file("sub/b.txt", "bye");
        harness
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Sorted listing of every path under `dir`, relative to it
    pub fn tree(dir: &Path) -> Vec<String> {
        let mut paths: Vec<String> = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                let entry = entry.unwrap();
                entry
                    .path()
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        paths.sort();
        paths
    }
}

#[test]
fn test_take_list_checkout_scenario() {
    let harness = SnapshotTestHarness::with_sample_tree();

    let record = harness.snapshots.take("first").unwrap();
    info!("Took {}", record.id);

    let listed = harness.snapshots.list().unwrap();
    assert_eq!(listed, vec![record.clone()]);

    let out = TempDir::new().unwrap();
    let dest = out.path().join("restored");
    let result = harness.snapshots.checkout(&record.id, Some(&dest)).unwrap();

    assert_eq!(result.summary.files, 2);
    assert_eq!(result.summary.directories, 1);
    assert_eq!(SnapshotTestHarness::tree(&dest), vec!["a.txt", "sub", "sub/b.txt"]);
    assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "hi");
    assert_eq!(fs::read_to_string(dest.join("sub/b.txt")).unwrap(), "bye");
}

#[test]
fn test_fresh_root_has_no_snapshots() {
    let harness = SnapshotTestHarness::new();
    assert!(harness.snapshots.list().unwrap().is_empty());
    assert!(!harness.path(".snapshots/data.json").exists());
}

#[test]
fn test_many_snapshots_within_one_second() {
    let harness = SnapshotTestHarness::new();
    let mut records = Vec::new();

    for i in 0..10 {
        harness.write_file("counter.txt", &i.to_string());
        records.push(harness.snapshots.take(&format!("take {}", i)).unwrap());
    }

    let listed = harness.snapshots.list().unwrap();
    assert_eq!(listed.len(), 10);
    let messages: Vec<_> = listed.iter().map(|r| r.message.clone()).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("take {}", i)).collect();
    assert_eq!(messages, expected);

    let out = TempDir::new().unwrap();
    for (i, record) in records.iter().enumerate() {
        let dest = out.path().join(&record.id);
        harness.snapshots.checkout(&record.id, Some(&dest)).unwrap();
        assert_eq!(fs::read_to_string(dest.join("counter.txt")).unwrap(), i.to_string());
    }
}

#[test]
fn test_unknown_id_touches_nothing() {
    let harness = SnapshotTestHarness::with_sample_tree();
    harness.snapshots.take("only").unwrap();

    let before = SnapshotTestHarness::tree(harness.root.path());
    let registry_before = fs::read(harness.path(".snapshots/data.json")).unwrap();

    let err = harness.snapshots.checkout("not-an-id", None).unwrap_err();
    assert!(matches!(err, SnapshotError::UnknownSnapshot(_)));
    assert!(err.user_message().contains("not-an-id"));

    assert_eq!(SnapshotTestHarness::tree(harness.root.path()), before);
    assert_eq!(fs::read(harness.path(".snapshots/data.json")).unwrap(), registry_before);
}

#[test]
fn test_ignore_file_excludes_subtree() {
    let harness = SnapshotTestHarness::with_sample_tree();
    harness.write_file(".signore", "# build output\nsub\n");

    let record = harness.snapshots.take("ignored").unwrap();
    let out = TempDir::new().unwrap();
    let dest = out.path().join("d");
    harness.snapshots.checkout(&record.id, Some(&dest)).unwrap();

    assert_eq!(SnapshotTestHarness::tree(&dest), vec![".signore", "a.txt"]);
    assert!(!dest.join("sub").exists());
}

#[test]
fn test_snapshots_never_contain_storage() {
    let harness = SnapshotTestHarness::with_sample_tree();
    let first = harness.snapshots.take("first").unwrap();
    harness.snapshots.checkout(&first.id, None).unwrap();
    let second = harness.snapshots.take("second").unwrap();

    let out = TempDir::new().unwrap();
    let dest = out.path().join("d");
    harness.snapshots.checkout(&second.id, Some(&dest)).unwrap();

    assert_eq!(SnapshotTestHarness::tree(&dest), vec!["a.txt", "sub", "sub/b.txt"]);
}

#[test]
fn test_tampered_archive_is_corrupt() {
    let harness = SnapshotTestHarness::with_sample_tree();
    let record = harness.snapshots.take("t").unwrap();

    let archive = record.resolve_archive(harness.root.path());
    let mut bytes = fs::read(&archive).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] = bytes[middle].wrapping_add(1);
    fs::write(&archive, bytes).unwrap();

    let err = harness.snapshots.checkout(&record.id, None).unwrap_err();
    assert!(matches!(err, SnapshotError::CorruptArchive(_)), "got {:?}", err);
}

#[test]
fn test_legacy_registry_entry_checks_out() {
    let harness = SnapshotTestHarness::with_sample_tree();

    // Archive stored under an absolute path, no checksum recorded
    let archive = harness.path(".snapshots/snapshot_2020_09_13_12_26_40.tar.gz");
    let file = fs::File::create(&archive).unwrap();
    write_archive(harness.root.path(), &IgnoreSet::from_patterns([".snapshots"]), file).unwrap();

    let registry = serde_json::json!({
        "5f5e1000": {
            "Message": "old",
            "Timestamp": 1_600_000_000,
            "FileName": archive,
        }
    });
    fs::write(
        harness.path(".snapshots/data.json"),
        serde_json::to_string(&registry).unwrap(),
    )
    .unwrap();

    let listed = harness.snapshots.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].display_format().starts_with("Snapshot Id:\t5f5e1000\nDate:\t"));

    let result = harness.snapshots.checkout("5f5e1000", None).unwrap();
    assert_eq!(
        result.destination,
        harness.path("checkedout_versions/snapshot_5f5e1000")
    );
    assert_eq!(fs::read_to_string(result.destination.join("sub/b.txt")).unwrap(), "bye");
}

#[test]
fn test_take_preserves_existing_entries() {
    let harness = SnapshotTestHarness::with_sample_tree();
    fs::write(
        harness.path(".snapshots/data.json"),
        r#"{"1":{"Message":"ancient","Timestamp":1,"FileName":"gone.tar.gz"}}"#,
    )
    .unwrap();

    harness.snapshots.take("new").unwrap();

    let listed = harness.snapshots.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].message, "ancient");
    assert_eq!(listed[1].message, "new");

    let err = harness.snapshots.checkout("1", None).unwrap_err();
    assert!(matches!(err, SnapshotError::ArchiveUnreadable { .. }));
}

#[test]
fn test_discover_from_nested_directory() {
    let harness = SnapshotTestHarness::with_sample_tree();
    let record = harness.snapshots.take("root level").unwrap();

    let nested = SnapshotsBuilder::new().discover(&harness.path("sub")).unwrap();
    assert_eq!(nested.root(), harness.root.path());
    assert_eq!(nested.list().unwrap(), vec![record]);
    assert!(!harness.path("sub/.snapshots").exists());
}

#[test]
fn test_open_non_directory_root() {
    let harness = SnapshotTestHarness::with_sample_tree();
    let err = Snapshots::open(&harness.path("a.txt")).unwrap_err();
    assert!(matches!(err, SnapshotError::NotADirectory(_)));
}

#[cfg(unix)]
#[test]
fn test_failed_take_leaves_registry_untouched() {
    use std::os::unix::fs::PermissionsExt;

    let harness = SnapshotTestHarness::with_sample_tree();
    let first = harness.snapshots.take("good").unwrap();
    let registry_before = fs::read(harness.path(".snapshots/data.json")).unwrap();

    let locked = harness.path("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running as root; permission bits are not enforced
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = harness.snapshots.take("bad");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(SnapshotError::WalkFailed { .. })));
    assert_eq!(fs::read(harness.path(".snapshots/data.json")).unwrap(), registry_before);
    assert_eq!(harness.snapshots.list().unwrap(), vec![first]);
}
