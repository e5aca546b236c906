//! Archive writer: directory tree to compressed tar stream
//!
//! The writer walks a root directory depth-first and emits one tar record per
//! directory and regular file, then compresses the whole sequence as a single
//! gzip stream:
//!
//! ```text
//! gzip( [hdr a.txt][bytes] [hdr sub/] [hdr sub/b.txt][bytes] [eof blocks] )
//! ```
//!
//! Each header carries the `/`-separated path relative to the root, the
//! permission bits, the entry type and the content length. Entries appear in
//! visitation order: a directory always precedes its descendants. Siblings are
//! visited in file-name order so repeated runs over an unchanged tree produce
//! the same entry order, but readers must not depend on it.
//!
//! Paths excluded by the [`IgnoreSet`] are pruned: an excluded directory is
//! never descended into. Symbolic links and special files are skipped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use snapshot::writer::write_archive;
//! use snapshot::IgnoreSet;
//! use std::fs::File;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let out = File::create("project.tar.gz")?;
//! let ignore = IgnoreSet::from_patterns(["target"]);
//! let summary = write_archive(Path::new("./project"), &ignore, out)?;
//! println!("archived {} files", summary.files);
//! # Ok(())
//! # }
//! ```

use crate::compression::CompressionLevel;
use crate::error::{Result, SnapshotError};
use crate::ignore_set::IgnoreSet;
use crate::types::{ArchiveEntry, ArchiveSummary, EntryKind};
use crate::utils;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Write `root` as a gzip-compressed tar stream into `sink`
///
/// Uses the default compression level. See [`ArchiveWriter`] for other levels.
///
/// # Errors
///
/// - [`SnapshotError::PathNotFound`] if `root` does not exist
/// - [`SnapshotError::NotADirectory`] if `root` is not a directory
/// - [`SnapshotError::WalkFailed`] if an entry cannot be visited or read
/// - [`SnapshotError::WriteFailed`] if writing to `sink` fails
///
/// Precondition failures are reported before anything is written to `sink`.
/// Other failures may leave partial output behind.
pub fn write_archive<W: Write>(root: &Path, ignore: &IgnoreSet, sink: W) -> Result<ArchiveSummary> {
    ArchiveWriter::new(root).with_ignore(ignore.clone()).write(sink)
}

/// Configurable archive writer
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
    ignore: IgnoreSet,
    compression: CompressionLevel,
}

impl ArchiveWriter {
    /// Create a writer for `root` with no exclusions and default compression
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: IgnoreSet::new(),
            compression: CompressionLevel::default(),
        }
    }

    /// Set the exclusion patterns
    pub fn with_ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }

    /// Set the gzip level
    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Walk the root and write the archive into `sink`
    pub fn write<W: Write>(&self, sink: W) -> Result<ArchiveSummary> {
        self.check_root()?;
        info!("Archiving {:?}", self.root);

        let encoder = GzEncoder::new(sink, self.compression.as_flate2());
        let mut builder = tar::Builder::new(encoder);
        let mut summary = ArchiveSummary::default();

        let root = self.root.as_path();
        let ignore = &self.ignore;
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = relative_path(root, entry.path());
                let excluded = ignore.is_excluded(&name);
                if excluded {
                    debug!("Excluding {:?}", name);
                }
                !excluded
            });

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let name = relative_path(root, entry.path());
            let file_type = entry.file_type();

            if file_type.is_dir() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| walk_error(root, e))?;
                let mode = utils::get_permissions(&metadata);
                append_directory(&mut builder, &name, mode, mtime(&metadata))?;
                summary.directories += 1;
                summary.entries.push(ArchiveEntry {
                    path: name,
                    mode,
                    kind: EntryKind::Directory,
                    size: 0,
                });
            } else if file_type.is_file() {
                let (mode, size) = append_file(&mut builder, entry.path(), &name)?;
                summary.files += 1;
                summary.bytes += size;
                summary.entries.push(ArchiveEntry {
                    path: name,
                    mode,
                    kind: EntryKind::File,
                    size,
                });
            } else {
                debug!("Skipping non-regular entry {:?}", name);
            }
        }

        let encoder = builder.into_inner().map_err(SnapshotError::WriteFailed)?;
        let mut sink = encoder.finish().map_err(SnapshotError::WriteFailed)?;
        sink.flush().map_err(SnapshotError::WriteFailed)?;

        info!(
            "Archived {} files and {} directories ({})",
            summary.files,
            summary.directories,
            utils::format_bytes(summary.bytes)
        );
        Ok(summary)
    }

    fn check_root(&self) -> Result<()> {
        let metadata = match fs::metadata(&self.root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::PathNotFound(self.root.clone()));
            }
            Err(e) => return Err(SnapshotError::walk_failed(&self.root, e)),
        };
        if !metadata.is_dir() {
            return Err(SnapshotError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }
}

fn append_directory<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &Path,
    mode: u32,
    mtime: u64,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(mode);
    header.set_mtime(mtime);
    builder
        .append_data(&mut header, name, io::empty())
        .map_err(SnapshotError::WriteFailed)?;
    trace!("Wrote directory {:?} ({:o})", name, mode);
    Ok(())
}

/// Append one regular file, returning its mode and size
fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &Path, name: &Path) -> Result<(u32, u64)> {
    let file = File::open(path).map_err(|e| SnapshotError::walk_failed(path, e))?;
    let metadata = file.metadata().map_err(|e| SnapshotError::walk_failed(path, e))?;
    let mode = utils::get_permissions(&metadata);
    let size = metadata.len();

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(mtime(&metadata));

    let mut source = FileSource::new(file.take(size));
    if let Err(e) = builder.append_data(&mut header, name, &mut source) {
        return Err(match source.read_error.take() {
            Some(read_error) => SnapshotError::walk_failed(path, read_error),
            None => SnapshotError::WriteFailed(e),
        });
    }
    if source.bytes_read != size {
        return Err(SnapshotError::walk_failed(
            path,
            io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("file shrank from {} to {} bytes while archiving", size, source.bytes_read),
            ),
        ));
    }

    trace!("Wrote file {:?} ({} bytes, {:o})", name, size, mode);
    Ok((mode, size))
}

/// Reader wrapper that tells source failures apart from sink failures
struct FileSource<R> {
    inner: R,
    bytes_read: u64,
    read_error: Option<io::Error>,
}

impl<R: Read> FileSource<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
            read_error: None,
        }
    }
}

impl<R: Read> Read for FileSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                self.bytes_read += n as u64;
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Err(e),
            Err(e) => {
                let kind = e.kind();
                let message = e.to_string();
                self.read_error = Some(e);
                Err(io::Error::new(kind, message))
            }
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(utils::archive_path)
        .unwrap_or_default()
}

fn mtime(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn walk_error(root: &Path, err: walkdir::Error) -> SnapshotError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(ErrorKind::Other, "filesystem loop detected"));
    SnapshotError::walk_failed(path, source)
}
