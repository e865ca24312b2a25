use crate::error::{Result, VintageError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Recursively copies `src` into `dst`, skipping any entry for which `exclude`
/// returns true (paths are given relative to `src`). Excluded directories are not
/// descended into. Only regular files and symlinks are copied; other special files
/// are skipped. Returns the number of files copied.
pub fn copy_tree<F>(src: &Path, dst: &Path, exclude: F) -> Result<u64>
where
    F: Fn(&Path) -> bool,
{
    let mut copied = 0;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(src) {
            Ok(rel) => rel.as_os_str().is_empty() || !exclude(rel),
            Err(_) => false,
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            VintageError::fs(path, io::Error::other(e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| VintageError::fs(entry.path(), io::Error::other(e)))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| VintageError::fs(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else if file_type.is_file() {
            trace!(from = %entry.path().display(), to = %target.display(), "copy");
            fs::copy(entry.path(), &target).map_err(|e| VintageError::fs(entry.path(), e))?;
            copied += 1;
        } else {
            // pipes, sockets and device nodes; reading a fifo would block forever
            warn!(path = %entry.path().display(), "skipping special file");
        }
    }

    Ok(copied)
}

/// Replaces `dst` with a copy of `src`: a directory replaces the whole destination
/// subtree, a file overwrites the destination file.
///
/// Returns the raw `io::Error` so callers can decide which failures are tolerable.
pub fn replace_path(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::metadata(src)?;
    if !meta.is_dir() && !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file or directory",
        ));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::symlink_metadata(dst) {
        Ok(existing) if existing.is_dir() => fs::remove_dir_all(dst)?,
        Ok(_) if meta.is_dir() => fs::remove_file(dst)?,
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if meta.is_dir() {
        copy_tree(src, dst, |_| false).map_err(|e| match e {
            VintageError::Filesystem { source, .. } => source,
            other => io::Error::other(other.to_string()),
        })?;
    } else {
        fs::copy(src, dst)?;
    }

    Ok(())
}

/// Flushes every regular file under `root` to disk.
pub fn sync_tree(root: &Path) -> Result<u64> {
    let mut synced = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| VintageError::fs(root, io::Error::other(e)))?;
        if entry.file_type().is_file() {
            fs::File::open(entry.path())
                .and_then(|file| file.sync_all())
                .map_err(|e| VintageError::fs(entry.path(), e))?;
            synced += 1;
        }
    }
    Ok(synced)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| VintageError::fs(src, e))?;
    std::os::unix::fs::symlink(&target, dst).map_err(|e| VintageError::fs(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        return Ok(());
    }
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| VintageError::fs(src, e))
}
