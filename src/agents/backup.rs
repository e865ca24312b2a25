use crate::error::{Result, VintageError};
use crate::utils::fs::copy_tree;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEPENDENCY_CACHE_DIR: &str = "node_modules";
pub const VCS_METADATA_DIR: &str = ".git";
const BACKUP_SUFFIX: &str = "-backup";

/// A completed point-in-time copy of the project. Never removed by this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub files: u64,
}

/// BackupManager snapshots the working directory into a sibling folder
pub struct BackupManager {
    scratch_dir: String,
}

impl BackupManager {
    pub fn new(scratch_dir: impl Into<String>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Copy `source_dir` to `<parent>/<name>-backup` (or the first free `-backup-<n>`).
    ///
    /// The artifact is only returned once every file has been copied; any I/O error
    /// aborts and leaves whatever was written for inspection.
    pub fn create_backup(&self, source_dir: &Path) -> Result<BackupArtifact> {
        let base = backup_base_name(source_dir)?;
        let parent = source_dir.parent().ok_or_else(|| {
            VintageError::Prerequisite(format!(
                "'{}' has no parent directory to hold a backup",
                source_dir.display()
            ))
        })?;
        if !source_dir.is_dir() {
            return Err(VintageError::fs(
                source_dir,
                io::Error::new(io::ErrorKind::NotFound, "project directory not found"),
            ));
        }
        let target = next_free_path(parent, &base);

        debug!(from = %source_dir.display(), to = %target.display(), "creating backup");
        fs::create_dir_all(&target).map_err(|e| VintageError::fs(&target, e))?;

        let files = copy_tree(source_dir, &target, |rel| self.is_excluded(rel, &base))?;

        Ok(BackupArtifact {
            path: target,
            files,
        })
    }

    /// Whether a path relative to the project root stays out of the backup.
    ///
    /// Matches whole components: dependency cache, VCS metadata, the update scratch
    /// area, and any earlier backup folder that ended up inside the tree.
    pub fn is_excluded(&self, relative: &Path, backup_base: &str) -> bool {
        relative.components().any(|component| {
            let name = component.as_os_str();
            name == OsStr::new(DEPENDENCY_CACHE_DIR)
                || name == OsStr::new(VCS_METADATA_DIR)
                || name == OsStr::new(&self.scratch_dir)
                || is_backup_name(name, backup_base)
        })
    }
}

/// `<project-folder-name>-backup`
pub fn backup_base_name(source_dir: &Path) -> Result<String> {
    let name = source_dir
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| {
            VintageError::Prerequisite(format!(
                "Cannot derive a backup name from '{}'",
                source_dir.display()
            ))
        })?;
    Ok(format!("{name}{BACKUP_SUFFIX}"))
}

fn is_backup_name(name: &OsStr, base: &str) -> bool {
    match name.to_str() {
        Some(name) => {
            name == base
                || name
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        }
        None => false,
    }
}

fn next_free_path(parent: &Path, base: &str) -> PathBuf {
    let first = parent.join(base);
    if !first.exists() {
        return first;
    }

    (2u32..)
        .map(|n| parent.join(format!("{base}-{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn excluded_folders_never_reach_the_backup() {
        let root = tempdir().unwrap();
        let project = root.path().join("site");
        write(&project.join("package.json"), r#"{"version":"1.0.0"}"#);
        write(&project.join("src/index.js"), "console.log(1);\n");
        write(&project.join("gulp/tasks/build.js"), "module.exports = {};\n");
        write(&project.join("node_modules/lib/index.js"), "cache");
        write(&project.join("src/node_modules/inner.js"), "cache");
        write(&project.join(".git/HEAD"), "ref: refs/heads/main\n");
        write(&project.join("site-backup/old.txt"), "old");
        write(&project.join("site-backup-3/old.txt"), "older");
        write(&project.join(".vintage-update/bundle.tar.gz"), "partial");

        let artifact = BackupManager::new(".vintage-update")
            .create_backup(&project)
            .unwrap();

        assert_eq!(artifact.path, root.path().join("site-backup"));
        assert_eq!(artifact.files, 3);
        for kept in ["package.json", "src/index.js", "gulp/tasks/build.js"] {
            assert_eq!(
                fs::read(project.join(kept)).unwrap(),
                fs::read(artifact.path.join(kept)).unwrap(),
                "{kept}"
            );
        }
        for dropped in [
            "node_modules",
            "src/node_modules",
            ".git",
            "site-backup",
            "site-backup-3",
            ".vintage-update",
        ] {
            assert!(!artifact.path.join(dropped).exists(), "{dropped}");
        }
    }

    #[test]
    fn existing_backup_is_kept_and_next_name_used() {
        let root = tempdir().unwrap();
        let project = root.path().join("site");
        write(&project.join("a.txt"), "new");
        write(&root.path().join("site-backup/a.txt"), "first");

        let artifact = BackupManager::new(".vintage-update")
            .create_backup(&project)
            .unwrap();

        assert_eq!(artifact.path, root.path().join("site-backup-2"));
        assert_eq!(
            fs::read_to_string(root.path().join("site-backup/a.txt")).unwrap(),
            "first"
        );
        assert_eq!(fs::read_to_string(artifact.path.join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn similar_names_are_not_excluded() {
        let manager = BackupManager::new(".vintage-update");
        assert!(!manager.is_excluded(Path::new("site-backups/x"), "site-backup"));
        assert!(!manager.is_excluded(Path::new("site-backup-old/x"), "site-backup"));
        assert!(!manager.is_excluded(Path::new("src/git/x"), "site-backup"));
        assert!(manager.is_excluded(Path::new("a/b/.git/config"), "site-backup"));
    }

    #[cfg(unix)]
    #[test]
    fn named_pipe_in_project_does_not_stall_backup() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let root = tempdir().unwrap();
        let project = root.path().join("site");
        write(&project.join("index.html"), "<html></html>");
        let status = std::process::Command::new("mkfifo")
            .arg(project.join("pipe"))
            .status()
            .unwrap();
        assert!(status.success());

        let (tx, rx) = mpsc::channel();
        let source = project.clone();
        thread::spawn(move || {
            let _ = tx.send(BackupManager::new(".vintage-update").create_backup(&source));
        });

        let artifact = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("backup did not finish")
            .unwrap();
        assert_eq!(artifact.files, 1);
        assert!(artifact.path.join("index.html").is_file());
        assert!(fs::symlink_metadata(artifact.path.join("pipe")).is_err());
    }

    #[test]
    fn missing_source_fails() {
        let root = tempdir().unwrap();
        let err = BackupManager::new(".vintage-update")
            .create_backup(&root.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, VintageError::Filesystem { .. }));
    }
}
