use crate::error::{Result, VintageError};
use crate::remote::RemoteSource;
use crate::utils::fs::sync_tree;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};

const ARCHIVE_NAME: &str = "bundle.tar.gz";
const UNPACK_DIR: &str = "bundle";

/// Unpacked template bundle. Every file under `root` has been flushed to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBundle {
    pub root: PathBuf,
    pub files: u64,
}

/// FetchAndStageManager downloads the template archive into the scratch area and unpacks it
pub struct FetchAndStageManager<'a> {
    remote: &'a dyn RemoteSource,
    scratch: PathBuf,
}

impl<'a> FetchAndStageManager<'a> {
    pub fn new(remote: &'a dyn RemoteSource, working_dir: &Path, scratch_dir: &str) -> Self {
        Self {
            remote,
            scratch: working_dir.join(scratch_dir),
        }
    }

    pub fn scratch_path(&self) -> &Path {
        &self.scratch
    }

    /// Create the scratch directory. An existing one is reused.
    pub fn ensure_scratch(&self) -> Result<()> {
        match fs::create_dir(&self.scratch) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && self.scratch.is_dir() => Ok(()),
            Err(e) => Err(VintageError::fs(&self.scratch, e)),
        }
    }

    /// Download `bundle_url` and unpack it. Returns only after the archive has been
    /// fully read and every extracted file synced, so the result is safe to merge from.
    ///
    /// On failure the scratch directory is left in place.
    pub fn fetch_and_stage(&self, bundle_url: &str) -> Result<StagedBundle> {
        self.ensure_scratch()?;

        let archive_path = self.scratch.join(ARCHIVE_NAME);
        let bytes = self.remote.download(bundle_url, &archive_path)?;
        debug!(bytes, archive = %archive_path.display(), "bundle downloaded");

        let unpack_dir = self.scratch.join(UNPACK_DIR);
        // leftovers from an earlier failed run must not mix with this bundle
        match fs::remove_dir_all(&unpack_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(VintageError::fs(&unpack_dir, e)),
        }
        fs::create_dir_all(&unpack_dir).map_err(|e| VintageError::fs(&unpack_dir, e))?;

        unpack_tar_gz(&archive_path, &unpack_dir)?;
        let files = sync_tree(&unpack_dir)?;
        let root = bundle_root(&unpack_dir)?;

        debug!(files, root = %root.display(), "bundle staged");
        Ok(StagedBundle { root, files })
    }
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| VintageError::fs(archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(false);
    archive
        .unpack(dest)
        .map_err(|e| VintageError::fs(archive_path, e))
}

/// Source-hosting archives wrap everything in one `<repo>-<ref>/` folder; use it as
/// the root when that is the only entry.
fn bundle_root(unpack_dir: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(unpack_dir).map_err(|e| VintageError::fs(unpack_dir, e))? {
        let entry = entry.map_err(|e| VintageError::fs(unpack_dir, e))?;
        entries.push(entry.path());
    }

    match entries.as_slice() {
        [] => Err(VintageError::fs(
            unpack_dir,
            io::Error::new(io::ErrorKind::InvalidData, "template bundle archive is empty"),
        )),
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(unpack_dir.to_path_buf()),
    }
}

/// Removes the scratch directory exactly once: explicitly through [`ScratchGuard::cleanup`],
/// or on drop if the pipeline bails out first.
pub struct ScratchGuard {
    path: PathBuf,
    armed: bool,
}

impl ScratchGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn cleanup(mut self) -> Result<()> {
        self.armed = false;
        remove_scratch(&self.path).map_err(|e| VintageError::fs(&self.path, e))
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = remove_scratch(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
            }
        }
    }
}

fn remove_scratch(path: &Path) -> io::Result<()> {
    debug!(path = %path.display(), "removing scratch directory");
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
