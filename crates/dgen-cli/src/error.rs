//! Pipeline error types.

use thiserror::Error;

use dgen_bundle::BundleError;
use dgen_media::{MediaError, ResolveError};
use dgen_models::{AssemblyError, ValidationError};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// A referenced URL failed to resolve.
    #[error("Assembly failed: {assembly} ({cause})")]
    UnresolvedMedia {
        assembly: AssemblyError,
        cause: ResolveError,
    },

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Persistence failed: {0}")]
    Bundle(#[from] BundleError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Conversion cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Error class for reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) | PipelineError::Assembly(_) => "validation",
            PipelineError::UnresolvedMedia { .. } | PipelineError::Media(_) => "resolution",
            PipelineError::Bundle(_) => "persistence",
            PipelineError::Join(_) => "internal",
            PipelineError::Cancelled => "cancelled",
        }
    }

    /// Input location of the failure, when there is one.
    pub fn location(&self) -> Option<String> {
        match self {
            PipelineError::Validation(e) => Some(e.path.clone()),
            PipelineError::Assembly(e) | PipelineError::UnresolvedMedia { assembly: e, .. } => e
                .location()
                .map(|(track, segment)| format!("tracks[{track}].segments[{segment}]")),
            _ => None,
        }
    }
}
