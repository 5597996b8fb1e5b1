//! Bundle error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors that can occur while writing or scanning bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Invalid bundle ID: {0}")]
    InvalidBundleId(String),

    #[error("Bundle already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Authoring backend failed: {0}")]
    Author(String),

    #[error("Failed to copy asset {path}: {source}")]
    AssetCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reconciliation failed for {expected}: {message}")]
    Reconciliation { expected: PathBuf, message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleError {
    pub fn author(msg: impl Into<String>) -> Self {
        Self::Author(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn reconciliation(expected: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Reconciliation {
            expected: expected.into(),
            message: message.into(),
        }
    }
}

/// Attach a path to an `io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> BundleResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> BundleResult<T> {
        self.map_err(|e| BundleError::io(path, e))
    }
}
