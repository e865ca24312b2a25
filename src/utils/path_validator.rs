use crate::error::{Result, VintageError};
use std::path::{Component, Path, PathBuf};

const SYSTEM_DIRS: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Checks paths before the updater reads or writes anything.
pub struct PathValidator;

impl PathValidator {
    /// Resolves the project directory the commands operate on.
    ///
    /// The directory must exist, sit outside system directories and have a parent,
    /// since `update-project` writes its backup next to it.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let project = path.canonicalize().map_err(|e| {
            VintageError::Prerequisite(format!(
                "Project directory '{}' cannot be resolved: {e}",
                path.display()
            ))
        })?;

        if !project.is_dir() {
            return Err(VintageError::Prerequisite(format!(
                "'{}' is a file, expected a project directory",
                project.display()
            )));
        }

        if let Some(system) = SYSTEM_DIRS.iter().map(Path::new).find(|dir| {
            path.starts_with(dir)
                || project.starts_with(dir)
                || dir.canonicalize().is_ok_and(|real| project.starts_with(real))
        }) {
            return Err(VintageError::Prerequisite(format!(
                "Refusing to treat system directory '{}' as a vintage project",
                system.display()
            )));
        }

        if project.parent().is_none() {
            return Err(VintageError::Prerequisite(
                "The filesystem root cannot be a project: backups are created next to the project folder"
                    .to_string(),
            ));
        }

        Ok(project)
    }

    /// Joins a manifest-relative path onto `base`, refusing anything that could escape it.
    ///
    /// Works on paths that do not exist yet, so it checks components instead of
    /// canonicalising.
    pub fn join_relative(base: &Path, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let all_normal = rel.components().all(|c| matches!(c, Component::Normal(_)));

        if relative.is_empty() || !all_normal {
            return Err(VintageError::Prerequisite(format!(
                "Path '{relative}' must stay inside '{}'",
                base.display()
            )));
        }

        Ok(base.join(rel))
    }
}
