use crate::error::{Result, VintageError};
use crate::utils::path_validator::PathValidator;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const PACKAGE_JSON: &str = "package.json";

/// ProjectScannerAgent inspects the working directory for a vintage-frontend project
pub struct ProjectScannerAgent {
    project_path: PathBuf,
    marker_file: String,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P, marker_file: impl Into<String>) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            marker_file: marker_file.into(),
        }
    }

    /// Reads the marker file and `package.json` into a [`ProjectState`].
    ///
    /// A missing marker means "not initialized"; a marker that exists but cannot be
    /// read or parsed is an error, since the project is in an unknown state.
    pub fn scan(&self) -> Result<ProjectState> {
        let working_directory = PathValidator::validate_project_path(&self.project_path)?;

        let marker = working_directory.join(&self.marker_file);
        let initialized = match fs::read(&marker) {
            Ok(bytes) => {
                serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                    VintageError::Prerequisite(format!(
                        "There are some problems with your vintage-frontend project: '{}' is not valid JSON ({e})",
                        marker.display()
                    ))
                })?;
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(VintageError::fs(marker, e)),
        };

        let installed_template_version = if initialized {
            read_package_version(&working_directory.join(PACKAGE_JSON))?
        } else {
            None
        };

        Ok(ProjectState {
            working_directory,
            installed_template_version,
            initialized,
        })
    }

    /// Scan and require an initialized project.
    pub fn require_initialized(&self) -> Result<ProjectState> {
        let state = self.scan()?;
        if !state.initialized {
            return Err(VintageError::Prerequisite(
                "vintage-frontend is not inited. Use \"vintage init\" to create a new vintage-frontend project".to_string(),
            ));
        }
        Ok(state)
    }
}

/// Snapshot of the project being updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    pub working_directory: PathBuf,
    pub installed_template_version: Option<String>,
    pub initialized: bool,
}

fn read_package_version(path: &Path) -> Result<Option<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VintageError::fs(path, e)),
    };

    let doc: Value = serde_json::from_slice(&bytes)?;
    Ok(doc
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string))
}
