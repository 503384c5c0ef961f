//! Recursive enumeration of the source tree.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SyncError;

/// A regular file found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub absolute_path: PathBuf,
    /// Path relative to the root, `/`-separated on every platform.
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Collect every regular file below `root`, sorted by relative path.
///
/// Symlinks to files are included, symlinks to directories are not followed,
/// dangling links and special files are skipped. Files whose relative path
/// is listed in `exclude` are left out.
pub fn scan_directory(root: &Path, exclude: &[&str]) -> Result<Vec<FileDescriptor>, SyncError> {
    let meta = fs::metadata(root).map_err(|e| SyncError::filesystem(root, e))?;
    if !meta.is_dir() {
        return Err(SyncError::filesystem(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "source is not a directory"),
        ));
    }

    info!(root = %root.display(), "Scanning source directory");
    let mut results = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SyncError::filesystem(path, io::Error::from(e))
        })?;
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }

        let size_bytes = if file_type.is_file() {
            entry
                .metadata()
                .map_err(|e| SyncError::filesystem(path, io::Error::from(e)))?
                .len()
        } else if file_type.is_symlink() {
            match fs::metadata(path) {
                Ok(target) if target.is_file() => target.len(),
                Ok(_) => {
                    warn!(path = %path.display(), "Skipping symlink that does not point to a regular file");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping dangling symlink");
                    continue;
                }
            }
        } else {
            debug!(path = %path.display(), "Skipping special file");
            continue;
        };

        let relative_path = relative_key_path(path, root)?;
        if exclude.contains(&relative_path.as_str()) {
            debug!(relative_path = %relative_path, "Excluded from scan");
            continue;
        }
        debug!(relative_path = %relative_path, size_bytes, "Found file");
        results.push(FileDescriptor {
            absolute_path: path.to_path_buf(),
            relative_path,
            size_bytes,
        });
    }
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    info!(
        files = results.len(),
        bytes = results.iter().map(|f| f.size_bytes).sum::<u64>(),
        "Completed directory scan"
    );
    Ok(results)
}

/// [`scan_directory`] on the blocking thread pool, so directory walking does
/// not stall the async runtime.
pub async fn scan_directory_blocking(
    root: PathBuf,
    exclude: Vec<String>,
) -> Result<Vec<FileDescriptor>, SyncError> {
    let join_root = root.clone();
    tokio::task::spawn_blocking(move || {
        let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
        scan_directory(&root, &exclude)
    })
    .await
    .map_err(|e| SyncError::filesystem(join_root, io::Error::other(e)))?
}

/// `path` relative to `root`, joined with `/`.
pub fn relative_key_path(path: &Path, root: &Path) -> Result<String, SyncError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        SyncError::filesystem(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path is outside the source root"),
        )
    })?;

    let mut segments = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    SyncError::filesystem(
                        path,
                        io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                    )
                })?;
                segments.push(name);
            }
            Component::CurDir => {}
            _ => {
                return Err(SyncError::filesystem(
                    path,
                    io::Error::new(io::ErrorKind::InvalidInput, "unexpected path component"),
                ))
            }
        }
    }
    Ok(segments.join("/"))
}
