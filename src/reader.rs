//! Archive reader: compressed tar stream back to a directory tree
//!
//! Entries are applied strictly in stream order. Directories are created with
//! all missing ancestors; files get their ancestors created defensively even
//! though the writer always emits a directory before its contents. Regular
//! files receive exactly the number of bytes their header declares.
//!
//! Directory permission bits are applied once every entry has been extracted,
//! deepest directory first, so that a read-only directory in the archive does
//! not block writing its own children.
//!
//! The gzip trailer is verified after the last entry, so a stream cut short
//! or altered anywhere is reported as corrupt.
//!
//! Failures are not rolled back: a failed restore can leave the destination
//! partially populated.

use crate::error::{Result, SnapshotError};
use crate::types::RestoreSummary;
use crate::utils;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, trace};

/// Extract the gzip-compressed tar stream `source` into `destination`
///
/// `destination` is created if it does not exist.
///
/// # Errors
///
/// - [`SnapshotError::CorruptArchive`] if the stream is malformed or truncated,
///   or an entry path escapes the destination
/// - [`SnapshotError::RestoreFailed`] if a file or directory cannot be created
///   or written
pub fn read_archive<R: Read>(source: R, destination: &Path) -> Result<RestoreSummary> {
    info!("Restoring archive into {:?}", destination);
    fs::create_dir_all(destination).map_err(|e| SnapshotError::restore_failed(destination, e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(source));
    let entries = archive.entries().map_err(corrupt)?;

    let mut summary = RestoreSummary::default();
    let mut directory_modes: Vec<(PathBuf, u32)> = Vec::new();

    for entry in entries {
        let mut entry = entry.map_err(corrupt)?;
        let relative = {
            let path = entry.path().map_err(corrupt)?;
            sanitize_entry_path(&path)?
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = destination.join(&relative);
        let mode = entry.header().mode().map_err(corrupt)?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| SnapshotError::restore_failed(&target, e))?;
            trace!("Created directory {:?}", relative);
            directory_modes.push((target, mode));
            summary.directories += 1;
        } else if entry_type.is_file() {
            let expected = entry.size();
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| SnapshotError::restore_failed(parent, e))?;
            }
            let written = extract_file(&mut entry, &target)?;
            if written != expected {
                return Err(SnapshotError::corrupt(format!(
                    "{:?} declares {} bytes but the stream holds {}",
                    relative, expected, written
                )));
            }
            utils::set_permissions(&target, mode)
                .map_err(|e| SnapshotError::restore_failed(&target, e))?;
            trace!("Restored file {:?} ({} bytes)", relative, written);
            summary.files += 1;
            summary.bytes += written;
        } else {
            debug!("Skipping unsupported entry {:?} ({:?})", relative, entry_type);
            summary.skipped += 1;
        }
    }

    // tar stops at its end-of-archive marker; reading the gzip stream to the
    // end checks its CRC and length trailer
    let mut decoder = archive.into_inner();
    io::copy(&mut decoder, &mut io::sink()).map_err(corrupt)?;

    directory_modes.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
    for (path, mode) in directory_modes {
        utils::set_permissions(&path, mode).map_err(|e| SnapshotError::restore_failed(&path, e))?;
    }

    info!(
        "Restored {} files and {} directories ({})",
        summary.files,
        summary.directories,
        utils::format_bytes(summary.bytes)
    );
    Ok(summary)
}

/// Copy one entry's content into `target`, keeping stream and disk errors apart
fn extract_file<R: Read>(entry: &mut R, target: &Path) -> Result<u64> {
    let mut file = File::create(target).map_err(|e| SnapshotError::restore_failed(target, e))?;
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = match entry.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(corrupt(e)),
        };
        file.write_all(&buffer[..n])
            .map_err(|e| SnapshotError::restore_failed(target, e))?;
        written += n as u64;
    }

    file.flush().map_err(|e| SnapshotError::restore_failed(target, e))?;
    Ok(written)
}

/// Reject absolute paths and `..` so entries stay inside the destination
fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SnapshotError::corrupt(format!(
                    "entry path {:?} escapes the destination",
                    path
                )));
            }
        }
    }
    Ok(clean)
}

fn corrupt(err: io::Error) -> SnapshotError {
    SnapshotError::corrupt(err.to_string())
}
