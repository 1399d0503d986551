//! Error types for plugin hosting

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Opening,
    Factory,
    Instantiation,
    Initialization,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::Factory => write!(f, "getting factory"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Initialization => write!(f, "initializing plugin"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Plugin load failed at {stage} stage: {path}\n  Reason: {reason}")]
    LoadFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    #[error("Unsupported plugin format: {0} (only VST3 plugins can be loaded)")]
    UnsupportedFormat(PathBuf),

    #[error("Plugin has no editor")]
    NoEditor,

    #[error("Plugin editor error: {0}")]
    Editor(String),

    #[error("Failed to read plugin state: {0}")]
    State(String),
}

impl HostError {
    pub(crate) fn load(path: impl Into<PathBuf>, stage: LoadStage, reason: impl Into<String>) -> Self {
        HostError::LoadFailed {
            path: path.into(),
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
