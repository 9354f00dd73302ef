//! Error types for orgahome

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using orgahome Error
pub type Result<T> = std::result::Result<T, Error>;

/// orgahome error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Static build failed at {path:?}: {source}")]
    Build {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load static manifest {path:?}: {reason}")]
    ManifestLoad { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn asset_not_found(relative_path: &str) -> Self {
        Error::NotFound {
            kind: "asset".to_string(),
            id: relative_path.to_string(),
        }
    }

    pub(crate) fn build(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Build {
            path: path.into(),
            source,
        }
    }
}
