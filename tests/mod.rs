//! Main test module for the snapshot crate
//!
//! This module includes all test suites:
//! - Integration tests for the take/list/checkout workflow
//! - Property-based tests for archive invariants

pub mod integration;

#[cfg(test)]
mod edge_cases {
    use ::snapshot::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory() {
        let root = TempDir::new().unwrap();
        let snapshots = Snapshots::open(root.path()).unwrap();

        let record = snapshots.take("Empty").unwrap();
        let out = TempDir::new().unwrap();
        let dest = out.path().join("empty");
        let result = snapshots.checkout(&record.id, Some(&dest)).unwrap();

        assert_eq!(result.summary.files, 0);
        assert!(dest.is_dir());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_special_filenames() {
        let root = TempDir::new().unwrap();
        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file.multiple.dots.txt",
            "UPPERCASE.TXT",
            "ünïcödé.txt",
            "日本語.txt",
            ".hidden",
        ];
        for name in &special_names {
            fs::write(root.path().join(name), name).unwrap();
        }

        let snapshots = Snapshots::open(root.path()).unwrap();
        let record = snapshots.take("Special names").unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join("d");
        snapshots.checkout(&record.id, Some(&dest)).unwrap();

        for name in &special_names {
            assert_eq!(fs::read_to_string(dest.join(name)).unwrap(), *name);
        }
    }

    #[test]
    fn test_long_path_names() {
        let root = TempDir::new().unwrap();
        let long_dir = "d".repeat(120);
        let long_file = format!("{}.txt", "f".repeat(150));
        let nested = root.path().join(&long_dir).join(&long_dir);
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(&long_file), "deep").unwrap();

        let mut archive = Vec::new();
        write_archive(root.path(), &IgnoreSet::new(), &mut archive).unwrap();

        let out = TempDir::new().unwrap();
        read_archive(archive.as_slice(), out.path()).unwrap();
        let restored = out.path().join(&long_dir).join(&long_dir).join(&long_file);
        assert_eq!(fs::read_to_string(restored).unwrap(), "deep");
    }

    #[test]
    fn test_large_file() {
        let root = TempDir::new().unwrap();
        let content: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        fs::write(root.path().join("big.bin"), &content).unwrap();

        let mut archive = Vec::new();
        let summary = write_archive(root.path(), &IgnoreSet::new(), &mut archive).unwrap();
        assert_eq!(summary.bytes, content.len() as u64);

        let out = TempDir::new().unwrap();
        read_archive(archive.as_slice(), out.path()).unwrap();
        assert_eq!(fs::read(out.path().join("big.bin")).unwrap(), content);
    }

    #[test]
    fn test_empty_subdirectories_survive() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a/b/c")).unwrap();

        let mut archive = Vec::new();
        let summary = write_archive(root.path(), &IgnoreSet::new(), &mut archive).unwrap();
        assert_eq!(summary.directories, 3);

        let out = TempDir::new().unwrap();
        read_archive(archive.as_slice(), out.path()).unwrap();
        assert!(out.path().join("a/b/c").is_dir());
    }

    #[test]
    fn test_empty_registry_file_is_treated_as_empty() {
        let root = TempDir::new().unwrap();
        let snapshots = Snapshots::open(root.path()).unwrap();
        fs::write(snapshots.registry_path(), "").unwrap();

        assert!(snapshots.list().unwrap().is_empty());
        snapshots.take("after empty").unwrap();
        assert_eq!(snapshots.list().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_registry_blocks_take() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "a").unwrap();
        let snapshots = Snapshots::open(root.path()).unwrap();
        fs::write(snapshots.registry_path(), "[1, 2").unwrap();

        assert!(matches!(snapshots.take("x"), Err(SnapshotError::Json(_))));
        assert!(matches!(snapshots.list(), Err(SnapshotError::Json(_))));
    }
}
