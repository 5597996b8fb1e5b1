//! Error types for media resolution.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by downloaders and probes.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create an FFprobe failure error.
    pub fn ffprobe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Whether another attempt may succeed: transport errors, 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            MediaError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            MediaError::Transport(e) => !e.is_builder() && !e.is_redirect(),
            MediaError::Io(_) => true,
            _ => false,
        }
    }
}

/// Why a single URL could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolveCause {
    #[error("invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("download failed: {message}")]
    DownloadFailed {
        /// Status code when the server answered with an error status
        http_status: Option<u16>,
        message: String,
    },

    #[error("probe failed: {message}")]
    ProbeFailed { message: String },

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl ResolveCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveCause::InvalidUrl { .. } => "invalid_url",
            ResolveCause::DownloadFailed { .. } => "download_failed",
            ResolveCause::ProbeFailed { .. } => "probe_failed",
            ResolveCause::Timeout { .. } => "timeout",
            ResolveCause::Cancelled => "cancelled",
        }
    }

    /// Classify a download-stage error.
    pub fn from_download(err: MediaError) -> Self {
        match err {
            MediaError::InvalidUrl(message) => ResolveCause::InvalidUrl { message },
            MediaError::HttpStatus { status, url } => ResolveCause::DownloadFailed {
                http_status: Some(status),
                message: format!("HTTP {} from {}", status, url),
            },
            MediaError::Cancelled => ResolveCause::Cancelled,
            MediaError::Timeout(seconds) => ResolveCause::Timeout { seconds },
            other => ResolveCause::DownloadFailed {
                http_status: None,
                message: other.to_string(),
            },
        }
    }

    /// Classify a probe-stage error.
    pub fn from_probe(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => ResolveCause::Cancelled,
            MediaError::Timeout(seconds) => ResolveCause::Timeout { seconds },
            other => ResolveCause::ProbeFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Per-URL failure reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{url}: {cause}")]
pub struct ResolveError {
    pub url: String,
    pub cause: ResolveCause,
}

impl ResolveError {
    pub fn new(url: impl Into<String>, cause: ResolveCause) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }

    /// HTTP status of a failed download, if the server sent one.
    pub fn http_status(&self) -> Option<u16> {
        match &self.cause {
            ResolveCause::DownloadFailed { http_status, .. } => *http_status,
            _ => None,
        }
    }
}
