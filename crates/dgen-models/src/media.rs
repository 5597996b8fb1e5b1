//! Resolved media resources.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Broad class of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote URL turned into a local file with known duration.
///
/// Owned by the resolver cache; consumers receive clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaResource {
    pub url: String,
    pub local_path: PathBuf,
    /// Duration in milliseconds (0 for still images)
    pub duration_ms: u64,
    /// Container/format name reported by the probe
    pub format: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub resolved_at: DateTime<Utc>,
}

impl MediaResource {
    /// File name of the local copy.
    pub fn file_name(&self) -> Option<&str> {
        self.local_path.file_name().and_then(|n| n.to_str())
    }
}
