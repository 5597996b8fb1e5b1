//! Validation and assembly error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for schema validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for timeline assembly.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Machine-readable reason attached to a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// Input is not parseable JSON
    MalformedJson,
    MissingField,
    InvalidEnum,
    InvalidTimeRange,
    TypeMismatch,
    /// Number outside its allowed range
    OutOfRange,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::MalformedJson => "MalformedJson",
            ValidationReason::MissingField => "MissingField",
            ValidationReason::InvalidEnum => "InvalidEnum",
            ValidationReason::InvalidTimeRange => "InvalidTimeRange",
            ValidationReason::TypeMismatch => "TypeMismatch",
            ValidationReason::OutOfRange => "OutOfRange",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First violation found in an input document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason} at {path}: {message}")]
pub struct ValidationError {
    pub reason: ValidationReason,
    /// Offending location, e.g. `tracks[2].segments[0].time_range.end`
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(reason: ValidationReason, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(path: impl Into<String>) -> Self {
        Self::new(ValidationReason::MissingField, path, "required field is missing")
    }

    pub fn type_mismatch(path: impl Into<String>, expected: &str) -> Self {
        Self::new(
            ValidationReason::TypeMismatch,
            path,
            format!("expected {}", expected),
        )
    }

    pub fn invalid_enum(path: impl Into<String>, value: &str, allowed: &[&str]) -> Self {
        Self::new(
            ValidationReason::InvalidEnum,
            path,
            format!("'{}' is not one of [{}]", value, allowed.join(", ")),
        )
    }

    pub fn invalid_time_range(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationReason::InvalidTimeRange, path, message)
    }

    pub fn out_of_range(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationReason::OutOfRange, path, message)
    }

    /// Prefix the path, used when validating drafts inside a batch document.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else {
            format!("{}.{}", prefix, self.path)
        };
        self
    }
}

/// Hard failures while building a [`crate::Project`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("track {track_index} ({track_kind}) cannot hold segment {segment_index} of kind {segment_kind}")]
    KindMismatch {
        track_index: usize,
        segment_index: usize,
        track_kind: String,
        segment_kind: String,
    },

    #[error("media for track {track_index} segment {segment_index} was not resolved: {url}")]
    UnresolvedMedia {
        track_index: usize,
        segment_index: usize,
        url: String,
    },

    #[error("invalid time range at track {track_index} segment {segment_index}: {range}")]
    InvalidTimeRange {
        track_index: usize,
        segment_index: usize,
        range: String,
    },

    #[error("material range {range} of track {track_index} segment {segment_index} exceeds media duration {duration_ms}ms")]
    MaterialRangeExceedsMedia {
        track_index: usize,
        segment_index: usize,
        range: String,
        duration_ms: u64,
    },

    #[error("project has no tracks")]
    Empty,
}

impl AssemblyError {
    /// `(track_index, segment_index)` of the offending segment, when known.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            AssemblyError::KindMismatch {
                track_index,
                segment_index,
                ..
            }
            | AssemblyError::UnresolvedMedia {
                track_index,
                segment_index,
                ..
            }
            | AssemblyError::InvalidTimeRange {
                track_index,
                segment_index,
                ..
            }
            | AssemblyError::MaterialRangeExceedsMedia {
                track_index,
                segment_index,
                ..
            } => Some((*track_index, *segment_index)),
            AssemblyError::Empty => None,
        }
    }
}
