//! Segment descriptions.
//!
//! A segment is a [`TimeRange`] plus a kind-specific payload. Each payload
//! variant carries only the fields valid for its kind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::kinds::SegmentKind;
use crate::time::TimeRange;

/// A single segment placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentDescription {
    /// Placement on the timeline
    pub time_range: TimeRange,
    /// Kind-specific content
    #[serde(flatten)]
    pub payload: SegmentPayload,
}

impl SegmentDescription {
    pub fn new(time_range: TimeRange, payload: SegmentPayload) -> Self {
        Self {
            time_range,
            payload,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        self.payload.kind()
    }

    pub fn material_url(&self) -> Option<&str> {
        self.payload.material_url()
    }
}

/// Kind-specific segment content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentPayload {
    Video(VideoPayload),
    Image(ImagePayload),
    Audio(AudioPayload),
    Text(TextPayload),
    Sticker(StickerPayload),
    Effect(EffectPayload),
    Filter(FilterPayload),
}

impl SegmentPayload {
    pub fn kind(&self) -> SegmentKind {
        match self {
            SegmentPayload::Video(_) => SegmentKind::Video,
            SegmentPayload::Image(_) => SegmentKind::Image,
            SegmentPayload::Audio(_) => SegmentKind::Audio,
            SegmentPayload::Text(_) => SegmentKind::Text,
            SegmentPayload::Sticker(_) => SegmentKind::Sticker,
            SegmentPayload::Effect(_) => SegmentKind::Effect,
            SegmentPayload::Filter(_) => SegmentKind::Filter,
        }
    }

    /// Remote media referenced by this payload, if any.
    pub fn material_url(&self) -> Option<&str> {
        match self {
            SegmentPayload::Video(v) => Some(&v.material_url),
            SegmentPayload::Image(i) => Some(&i.material_url),
            SegmentPayload::Audio(a) => Some(&a.material_url),
            _ => None,
        }
    }

    /// Trim range inside the source media, if any.
    pub fn material_range(&self) -> Option<&TimeRange> {
        match self {
            SegmentPayload::Video(v) => v.material_range.as_ref(),
            SegmentPayload::Audio(a) => a.material_range.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct VideoPayload {
    pub material_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<Keyframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ImagePayload {
    pub material_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AudioPayload {
    pub material_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade: Option<Fade>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TextPayload {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TextStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct StickerPayload {
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EffectPayload {
    pub effect_type: String,
    /// Effect parameters, each in `0..=100`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterPayload {
    pub filter_type: String,
    /// Strength in `0.0..=1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

/// Position/scale/rotation/opacity overrides. Absent values keep the
/// backend's defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    /// Uniform scale, used by text segments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl Transform {
    pub fn is_empty(&self) -> bool {
        self == &Transform::default()
    }
}

/// Normalized crop rectangle, each edge in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Crop {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterRef {
    pub filter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Intro,
    Outro,
    Loop,
}

impl AnimationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intro" => Some(AnimationKind::Intro),
            "outro" => Some(AnimationKind::Outro),
            "loop" => Some(AnimationKind::Loop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Animation {
    pub kind: AnimationKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyframeProperty {
    PositionX,
    PositionY,
    ScaleX,
    ScaleY,
    Rotation,
    Opacity,
    Volume,
}

impl KeyframeProperty {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "position_x" => Some(KeyframeProperty::PositionX),
            "position_y" => Some(KeyframeProperty::PositionY),
            "scale_x" => Some(KeyframeProperty::ScaleX),
            "scale_y" => Some(KeyframeProperty::ScaleY),
            "rotation" => Some(KeyframeProperty::Rotation),
            "opacity" => Some(KeyframeProperty::Opacity),
            "volume" => Some(KeyframeProperty::Volume),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyframeProperty::PositionX => "position_x",
            KeyframeProperty::PositionY => "position_y",
            KeyframeProperty::ScaleX => "scale_x",
            KeyframeProperty::ScaleY => "scale_y",
            KeyframeProperty::Rotation => "rotation",
            KeyframeProperty::Opacity => "opacity",
            KeyframeProperty::Volume => "volume",
        }
    }
}

/// A property value pinned at an offset relative to the segment start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Keyframe {
    pub property: KeyframeProperty,
    pub offset_ms: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Fade {
    #[serde(default)]
    pub in_ms: u64,
    #[serde(default)]
    pub out_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// `#RRGGBB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<TextAlign>,
}

/// Parse `#RRGGBB` (leading `#` optional) into normalized `[0, 1]` RGB.
pub fn parse_hex_color(s: &str) -> Option<[f64; 3]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([
        f64::from(channel(0)?) / 255.0,
        f64::from(channel(2)?) / 255.0,
        f64::from(channel(4)?) / 255.0,
    ])
}
