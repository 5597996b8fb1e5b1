//! Validated project descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::kinds::TrackKind;
use crate::segment::SegmentDescription;

/// Default project name when the input omits one.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

/// Default frame rate when the input omits one.
pub const DEFAULT_FPS: u32 = 30;

/// Default track volume.
pub const DEFAULT_TRACK_VOLUME: f64 = 1.0;

/// Validated input for one conversion. Immutable once produced by the
/// validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectDescription {
    /// Caller-chosen bundle identifier, if supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub tracks: Vec<TrackDescription>,
}

impl ProjectDescription {
    /// Total number of segments across all tracks.
    pub fn segment_count(&self) -> usize {
        self.tracks.iter().map(|t| t.segments.len()).sum()
    }

    /// Distinct media URLs in first-reference order.
    pub fn media_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .filter_map(|s| s.material_url())
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect()
    }
}

/// One track of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackDescription {
    #[serde(rename = "track_type")]
    pub kind: TrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub segments: Vec<SegmentDescription>,
}

fn default_volume() -> f64 {
    DEFAULT_TRACK_VOLUME
}

impl TrackDescription {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            name: None,
            muted: false,
            volume: DEFAULT_TRACK_VOLUME,
            segments: Vec::new(),
        }
    }

    pub fn with_segment(mut self, segment: SegmentDescription) -> Self {
        self.segments.push(segment);
        self
    }
}

/// Batch input: several drafts converted independently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DraftDocument {
    pub drafts: Vec<DraftEntry>,
}

/// Wire shape of a single draft.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DraftEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    pub project: ProjectHeader,
    pub tracks: Vec<TrackDescription>,
}

/// Canvas settings block of a draft.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
}

/// JSON Schema describing the accepted input documents.
pub fn input_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(DraftDocument)
}
