use crate::agents::orchestrator::UpdateStage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VintageError {
    #[error("Prerequisite check failed: {0}")]
    Prerequisite(String),

    #[error("Network request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Filesystem operation on '{}' failed: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid version '{value}': {source}")]
    VersionParse {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("package.json merge failed: {0}")]
    Merge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task execution failed: {0}")]
    TaskExecution(String),

    #[error("Update stopped while {stage}: {source}")]
    Pipeline {
        stage: UpdateStage,
        #[source]
        source: Box<VintageError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VintageError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VintageError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        VintageError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Stage that halted the update pipeline, if this error came from it.
    pub fn stage(&self) -> Option<UpdateStage> {
        match self {
            VintageError::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VintageError>;
