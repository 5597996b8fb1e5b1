//! Track and segment kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a timeline track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Sticker,
    Effect,
    Filter,
}

impl TrackKind {
    pub const ALL: [TrackKind; 6] = [
        TrackKind::Video,
        TrackKind::Audio,
        TrackKind::Text,
        TrackKind::Sticker,
        TrackKind::Effect,
        TrackKind::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Text => "text",
            TrackKind::Sticker => "sticker",
            TrackKind::Effect => "effect",
            TrackKind::Filter => "filter",
        }
    }

    /// Parse a wire name. `image` is a legacy alias for a video track.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" | "image" => Some(TrackKind::Video),
            "audio" => Some(TrackKind::Audio),
            "text" => Some(TrackKind::Text),
            "sticker" => Some(TrackKind::Sticker),
            "effect" => Some(TrackKind::Effect),
            "filter" => Some(TrackKind::Filter),
            _ => None,
        }
    }

    /// Segment kind assumed when a segment omits its own kind.
    pub fn default_segment_kind(&self) -> SegmentKind {
        match self {
            TrackKind::Video => SegmentKind::Video,
            TrackKind::Audio => SegmentKind::Audio,
            TrackKind::Text => SegmentKind::Text,
            TrackKind::Sticker => SegmentKind::Sticker,
            TrackKind::Effect => SegmentKind::Effect,
            TrackKind::Filter => SegmentKind::Filter,
        }
    }

    /// Whether a segment of `kind` may be placed on this track.
    pub fn accepts(&self, kind: SegmentKind) -> bool {
        matches!(
            (self, kind),
            (TrackKind::Video, SegmentKind::Video | SegmentKind::Image)
                | (TrackKind::Audio, SegmentKind::Audio)
                | (TrackKind::Text, SegmentKind::Text)
                | (TrackKind::Sticker, SegmentKind::Sticker)
                | (TrackKind::Effect, SegmentKind::Effect)
                | (TrackKind::Filter, SegmentKind::Filter)
        )
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a segment payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Video,
    Image,
    Audio,
    Text,
    Sticker,
    Effect,
    Filter,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Video => "video",
            SegmentKind::Image => "image",
            SegmentKind::Audio => "audio",
            SegmentKind::Text => "text",
            SegmentKind::Sticker => "sticker",
            SegmentKind::Effect => "effect",
            SegmentKind::Filter => "filter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(SegmentKind::Video),
            "image" => Some(SegmentKind::Image),
            "audio" => Some(SegmentKind::Audio),
            "text" => Some(SegmentKind::Text),
            "sticker" => Some(SegmentKind::Sticker),
            "effect" => Some(SegmentKind::Effect),
            "filter" => Some(SegmentKind::Filter),
            _ => None,
        }
    }

    /// Kinds whose payload references a remote media file.
    pub fn references_media(&self) -> bool {
        matches!(
            self,
            SegmentKind::Video | SegmentKind::Image | SegmentKind::Audio
        )
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_track_alias() {
        assert_eq!(TrackKind::parse("image"), Some(TrackKind::Video));
        assert_eq!(TrackKind::parse("lyrics"), None);
    }

    #[test]
    fn test_compatibility() {
        assert!(TrackKind::Video.accepts(SegmentKind::Image));
        assert!(TrackKind::Video.accepts(SegmentKind::Video));
        assert!(!TrackKind::Text.accepts(SegmentKind::Audio));
        assert!(!TrackKind::Effect.accepts(SegmentKind::Filter));
    }

    #[test]
    fn test_default_segment_kind_is_accepted() {
        for kind in TrackKind::ALL {
            assert!(kind.accepts(kind.default_segment_kind()), "{kind}");
        }
    }
}
