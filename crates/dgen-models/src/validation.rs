//! Schema validation of raw JSON project descriptions.
//!
//! The validator walks a [`serde_json::Value`] and returns the first
//! violation it meets, tagged with a [`ValidationReason`] and the path of
//! the offending node (`tracks[2].segments[0].time_range.end`). It performs
//! no I/O.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ValidationError, ValidationReason, ValidationResult};
use crate::kinds::{SegmentKind, TrackKind};
use crate::project::{
    ProjectDescription, TrackDescription, DEFAULT_FPS, DEFAULT_PROJECT_NAME, DEFAULT_TRACK_VOLUME,
};
use crate::segment::{
    parse_hex_color, Animation, AnimationKind, AudioPayload, Crop, EffectPayload, Fade, FilterPayload,
    FilterRef, ImagePayload, Keyframe, KeyframeProperty, SegmentDescription, SegmentPayload,
    StickerPayload, TextAlign, TextPayload, TextStyle, Transform, Transition, VideoPayload,
};
use crate::time::TimeRange;

type Object = Map<String, Value>;

const TRACK_KINDS: &[&str] = &["video", "image", "audio", "text", "sticker", "effect", "filter"];
const SEGMENT_KINDS: &[&str] = &["video", "image", "audio", "text", "sticker", "effect", "filter"];
const ANIMATION_KINDS: &[&str] = &["intro", "outro", "loop"];
const KEYFRAME_PROPERTIES: &[&str] = &[
    "position_x",
    "position_y",
    "scale_x",
    "scale_y",
    "rotation",
    "opacity",
    "volume",
];
const TEXT_ALIGNS: &[&str] = &["left", "center", "right"];

/// Validate a single-draft JSON document.
pub fn validate(raw: &str) -> ValidationResult<ProjectDescription> {
    let value = parse_json(raw)?;
    if value.as_object().is_some_and(|obj| present(obj, "drafts").is_some()) {
        return Err(ValidationError::type_mismatch(
            "drafts",
            "a single-draft document, found a batch of drafts",
        ));
    }
    validate_value(&value)
}

/// Validate an already parsed single-draft document.
pub fn validate_value(value: &Value) -> ValidationResult<ProjectDescription> {
    let description = project(value)?;
    debug!(
        name = %description.name,
        tracks = description.tracks.len(),
        segments = description.segment_count(),
        "Project description validated"
    );
    Ok(description)
}

/// Validate a document that is either a single draft or a batch
/// `{"drafts": [...]}`.
///
/// The outer result fails only when the document itself is unusable; each
/// draft of a batch validates independently.
pub fn validate_document(raw: &str) -> ValidationResult<Vec<ValidationResult<ProjectDescription>>> {
    let value = parse_json(raw)?;
    let root = as_object(&value, "")?;

    let Some(drafts) = present(root, "drafts") else {
        return Ok(vec![validate_value(&value)]);
    };

    let drafts = drafts
        .as_array()
        .ok_or_else(|| ValidationError::type_mismatch("drafts", "array"))?;
    if drafts.is_empty() {
        return Err(ValidationError::new(
            ValidationReason::MissingField,
            "drafts",
            "at least one draft is required",
        ));
    }

    Ok(drafts
        .iter()
        .enumerate()
        .map(|(i, draft)| validate_value(draft).map_err(|e| e.prefixed(&index("drafts", i))))
        .collect())
}

fn parse_json(raw: &str) -> ValidationResult<Value> {
    if raw.trim().is_empty() {
        return Err(ValidationError::new(
            ValidationReason::MalformedJson,
            "",
            "input is empty",
        ));
    }
    serde_json::from_str(raw).map_err(|e| {
        ValidationError::new(ValidationReason::MalformedJson, "", e.to_string())
    })
}

// ---------------------------------------------------------------------------
// Document structure
// ---------------------------------------------------------------------------

fn project(value: &Value) -> ValidationResult<ProjectDescription> {
    let root = as_object(value, "")?;

    // Canvas fields live under `project`, or at the top level when absent.
    let (header, header_path) = match present(root, "project") {
        Some(p) => (as_object(p, "project")?, "project"),
        None => (root, ""),
    };

    let name = opt_string(header, "name", header_path)?
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
    let width = req_dimension(header, "width", header_path)?;
    let height = req_dimension(header, "height", header_path)?;
    let fps = match present(header, "fps") {
        Some(_) => req_dimension(header, "fps", header_path)?,
        None => DEFAULT_FPS,
    };

    let draft_id = opt_string(root, "draft_id", "")?.filter(|id| !id.trim().is_empty());

    let tracks_value = required(root, "tracks", "")?;
    let raw_tracks = tracks_value
        .as_array()
        .ok_or_else(|| ValidationError::type_mismatch("tracks", "array"))?;
    if raw_tracks.is_empty() {
        return Err(ValidationError::new(
            ValidationReason::MissingField,
            "tracks",
            "at least one track is required",
        ));
    }

    let tracks = raw_tracks
        .iter()
        .enumerate()
        .map(|(i, t)| track(t, &index("tracks", i)))
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(ProjectDescription {
        draft_id,
        name,
        width,
        height,
        fps,
        tracks,
    })
}

fn track(value: &Value, path: &str) -> ValidationResult<TrackDescription> {
    let obj = as_object(value, path)?;

    let kind_name = req_string(obj, "track_type", path)?;
    let kind = TrackKind::parse(&kind_name).ok_or_else(|| {
        ValidationError::invalid_enum(join(path, "track_type"), &kind_name, TRACK_KINDS)
    })?;

    let name = opt_string(obj, "name", path)?;
    let muted = opt_bool(obj, "muted", path)?.unwrap_or(false);
    let volume = opt_f64(obj, "volume", path)?.unwrap_or(DEFAULT_TRACK_VOLUME);
    check_min(volume, 0.0, &join(path, "volume"))?;

    // An `image` track is a video track whose segments default to stills.
    let default_kind = if kind_name == "image" {
        SegmentKind::Image
    } else {
        kind.default_segment_kind()
    };

    let segments_path = join(path, "segments");
    let segments = opt_array(obj, "segments", path)?
        .iter()
        .enumerate()
        .map(|(j, s)| segment(s, &index(&segments_path, j), kind, default_kind))
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(TrackDescription {
        kind,
        name,
        muted,
        volume,
        segments,
    })
}

fn segment(
    value: &Value,
    path: &str,
    track_kind: TrackKind,
    default_kind: SegmentKind,
) -> ValidationResult<SegmentDescription> {
    let obj = as_object(value, path)?;

    let declared = present(obj, "kind")
        .map(|v| ("kind", v))
        .or_else(|| present(obj, "type").map(|v| ("type", v)));
    let kind = match declared {
        Some((key, v)) => {
            let field = join(path, key);
            let name = v
                .as_str()
                .ok_or_else(|| ValidationError::type_mismatch(&field, "string"))?;
            SegmentKind::parse(name)
                .ok_or_else(|| ValidationError::invalid_enum(&field, name, SEGMENT_KINDS))?
        }
        None => default_kind,
    };

    if !track_kind.accepts(kind) {
        return Err(ValidationError::new(
            ValidationReason::TypeMismatch,
            join(path, "kind"),
            format!("{} segment cannot be placed on a {} track", kind, track_kind),
        ));
    }

    let time_range = time_range(required(obj, "time_range", path)?, &join(path, "time_range"), path)?;

    let payload = match kind {
        SegmentKind::Video => SegmentPayload::Video(VideoPayload {
            material_url: req_nonempty(obj, "material_url", path)?,
            material_range: opt_material_range(obj, path)?,
            transform: opt_transform(obj, path)?,
            crop: opt_crop(obj, path)?,
            speed: opt_speed(obj, path)?,
            volume: opt_volume(obj, path)?,
            filters: list(obj, "filters", path, filter_ref)?,
            animations: list(obj, "animations", path, animation)?,
            keyframes: keyframes(obj, path, &time_range)?,
            transition: match present(obj, "transition") {
                Some(v) => Some(transition(v, &join(path, "transition"))?),
                None => None,
            },
        }),
        SegmentKind::Image => SegmentPayload::Image(ImagePayload {
            material_url: req_nonempty(obj, "material_url", path)?,
            transform: opt_transform(obj, path)?,
            animations: list(obj, "animations", path, animation)?,
            keyframes: keyframes(obj, path, &time_range)?,
        }),
        SegmentKind::Audio => SegmentPayload::Audio(AudioPayload {
            material_url: req_nonempty(obj, "material_url", path)?,
            material_range: opt_material_range(obj, path)?,
            volume: opt_volume(obj, path)?,
            speed: opt_speed(obj, path)?,
            fade: match present(obj, "fade") {
                Some(v) => Some(fade(v, &join(path, "fade"))?),
                None => None,
            },
            keyframes: keyframes(obj, path, &time_range)?,
        }),
        SegmentKind::Text => SegmentPayload::Text(TextPayload {
            content: req_string(obj, "content", path)?,
            style: match present(obj, "style") {
                Some(v) => Some(text_style(v, &join(path, "style"))?),
                None => None,
            },
            transform: opt_transform(obj, path)?,
            animations: list(obj, "animations", path, animation)?,
        }),
        SegmentKind::Sticker => SegmentPayload::Sticker(StickerPayload {
            resource_id: req_nonempty(obj, "resource_id", path)?,
            transform: opt_transform(obj, path)?,
        }),
        SegmentKind::Effect => SegmentPayload::Effect(EffectPayload {
            effect_type: req_nonempty(obj, "effect_type", path)?,
            params: list(obj, "params", path, |v, p| {
                let n = v
                    .as_f64()
                    .ok_or_else(|| ValidationError::type_mismatch(p, "number"))?;
                check_between(n, 0.0, 100.0, p)?;
                Ok(n)
            })?,
        }),
        SegmentKind::Filter => SegmentPayload::Filter(FilterPayload {
            filter_type: req_nonempty(obj, "filter_type", path)?,
            intensity: opt_unit(obj, "intensity", path)?,
        }),
    };

    Ok(SegmentDescription {
        time_range,
        payload,
    })
}

// ---------------------------------------------------------------------------
// Time ranges
// ---------------------------------------------------------------------------

/// Parse `{start, end}`; ordering violations are reported at `report_path`.
fn time_range(value: &Value, path: &str, report_path: &str) -> ValidationResult<TimeRange> {
    let obj = as_object(value, path)?;
    let start = millis(obj, "start", path)?;
    let end = millis(obj, "end", path)?;
    let range = TimeRange::new(start, end);
    if !range.is_valid() {
        return Err(ValidationError::invalid_time_range(
            report_path,
            format!("end ({}) must be greater than start ({})", end, start),
        ));
    }
    Ok(range)
}

fn opt_material_range(obj: &Object, path: &str) -> ValidationResult<Option<TimeRange>> {
    match present(obj, "material_range") {
        Some(v) => {
            let range_path = join(path, "material_range");
            Ok(Some(time_range(v, &range_path, &range_path)?))
        }
        None => Ok(None),
    }
}

/// Non-negative integer milliseconds. Integral floats (`1000.0`) are accepted.
fn millis(obj: &Object, key: &str, path: &str) -> ValidationResult<u64> {
    let field = join(path, key);
    let value = required(obj, key, path)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(n) if n < 0.0 => Err(ValidationError::invalid_time_range(
            field,
            format!("{} must be >= 0", key),
        )),
        Some(n) if n.fract() == 0.0 && n <= u64::MAX as f64 => Ok(n as u64),
        _ => Err(ValidationError::type_mismatch(field, "integer milliseconds")),
    }
}

// ---------------------------------------------------------------------------
// Payload properties
// ---------------------------------------------------------------------------

fn opt_transform(obj: &Object, path: &str) -> ValidationResult<Option<Transform>> {
    let Some(value) = present(obj, "transform") else {
        return Ok(None);
    };
    let path = join(path, "transform");
    let t = as_object(value, &path)?;
    let transform = Transform {
        position_x: opt_f64(t, "position_x", &path)?,
        position_y: opt_f64(t, "position_y", &path)?,
        scale_x: opt_f64(t, "scale_x", &path)?,
        scale_y: opt_f64(t, "scale_y", &path)?,
        scale: opt_f64(t, "scale", &path)?,
        rotation: opt_f64(t, "rotation", &path)?,
        opacity: opt_unit(t, "opacity", &path)?,
    };
    for (key, scale) in [
        ("scale_x", transform.scale_x),
        ("scale_y", transform.scale_y),
        ("scale", transform.scale),
    ] {
        if let Some(s) = scale {
            check_positive(s, &join(&path, key))?;
        }
    }
    Ok((!transform.is_empty()).then_some(transform))
}

fn opt_crop(obj: &Object, path: &str) -> ValidationResult<Option<Crop>> {
    let Some(value) = present(obj, "crop") else {
        return Ok(None);
    };
    let path = join(path, "crop");
    let c = as_object(value, &path)?;
    if opt_bool(c, "enabled", &path)? == Some(false) {
        return Ok(None);
    }
    let defaults = Crop::default();
    let crop = Crop {
        left: opt_unit(c, "left", &path)?.unwrap_or(defaults.left),
        top: opt_unit(c, "top", &path)?.unwrap_or(defaults.top),
        right: opt_unit(c, "right", &path)?.unwrap_or(defaults.right),
        bottom: opt_unit(c, "bottom", &path)?.unwrap_or(defaults.bottom),
    };
    if crop.left >= crop.right || crop.top >= crop.bottom {
        return Err(ValidationError::out_of_range(
            path,
            "crop rectangle must have left < right and top < bottom",
        ));
    }
    Ok(Some(crop))
}

fn opt_speed(obj: &Object, path: &str) -> ValidationResult<Option<f64>> {
    let speed = opt_f64(obj, "speed", path)?;
    if let Some(s) = speed {
        check_positive(s, &join(path, "speed"))?;
    }
    Ok(speed)
}

fn opt_volume(obj: &Object, path: &str) -> ValidationResult<Option<f64>> {
    let volume = opt_f64(obj, "volume", path)?;
    if let Some(v) = volume {
        check_min(v, 0.0, &join(path, "volume"))?;
    }
    Ok(volume)
}

fn filter_ref(value: &Value, path: &str) -> ValidationResult<FilterRef> {
    let obj = as_object(value, path)?;
    Ok(FilterRef {
        filter_type: req_nonempty(obj, "filter_type", path)?,
        intensity: opt_unit(obj, "intensity", path)?,
    })
}

fn animation(value: &Value, path: &str) -> ValidationResult<Animation> {
    let obj = as_object(value, path)?;
    let kind_name = req_string(obj, "kind", path)?;
    let kind = AnimationKind::parse(&kind_name).ok_or_else(|| {
        ValidationError::invalid_enum(join(path, "kind"), &kind_name, ANIMATION_KINDS)
    })?;
    Ok(Animation {
        kind,
        name: req_nonempty(obj, "name", path)?,
        duration_ms: opt_u64(obj, "duration_ms", path)?,
    })
}

fn transition(value: &Value, path: &str) -> ValidationResult<Transition> {
    let obj = as_object(value, path)?;
    Ok(Transition {
        name: req_nonempty(obj, "name", path)?,
        duration_ms: opt_u64(obj, "duration_ms", path)?,
    })
}

fn fade(value: &Value, path: &str) -> ValidationResult<Fade> {
    let obj = as_object(value, path)?;
    Ok(Fade {
        in_ms: opt_u64(obj, "in_ms", path)?.unwrap_or(0),
        out_ms: opt_u64(obj, "out_ms", path)?.unwrap_or(0),
    })
}

fn keyframes(obj: &Object, path: &str, range: &TimeRange) -> ValidationResult<Vec<Keyframe>> {
    let duration = range.duration_ms();
    list(obj, "keyframes", path, |value, kf_path| {
        let kf = as_object(value, kf_path)?;
        let property_name = req_string(kf, "property", kf_path)?;
        let property = KeyframeProperty::parse(&property_name).ok_or_else(|| {
            ValidationError::invalid_enum(join(kf_path, "property"), &property_name, KEYFRAME_PROPERTIES)
        })?;
        let offset_ms = opt_u64(kf, "offset_ms", kf_path)?
            .ok_or_else(|| ValidationError::missing_field(join(kf_path, "offset_ms")))?;
        if offset_ms > duration {
            return Err(ValidationError::out_of_range(
                join(kf_path, "offset_ms"),
                format!("offset {}ms is past the segment duration {}ms", offset_ms, duration),
            ));
        }
        let value = opt_f64(kf, "value", kf_path)?
            .ok_or_else(|| ValidationError::missing_field(join(kf_path, "value")))?;
        Ok(Keyframe {
            property,
            offset_ms,
            value,
        })
    })
}

fn text_style(value: &Value, path: &str) -> ValidationResult<TextStyle> {
    let obj = as_object(value, path)?;

    let font_size = opt_f64(obj, "font_size", path)?;
    if let Some(size) = font_size {
        check_positive(size, &join(path, "font_size"))?;
    }

    let color = opt_string(obj, "color", path)?;
    if let Some(c) = &color {
        if parse_hex_color(c).is_none() {
            return Err(ValidationError::type_mismatch(join(path, "color"), "#RRGGBB color"));
        }
    }

    let align = match opt_string(obj, "align", path)? {
        Some(a) => Some(
            TextAlign::parse(&a)
                .ok_or_else(|| ValidationError::invalid_enum(join(path, "align"), &a, TEXT_ALIGNS))?,
        ),
        None => None,
    };

    Ok(TextStyle {
        font_size,
        color,
        bold: opt_bool(obj, "bold", path)?.unwrap_or(false),
        italic: opt_bool(obj, "italic", path)?.unwrap_or(false),
        underline: opt_bool(obj, "underline", path)?.unwrap_or(false),
        align,
    })
}

// ---------------------------------------------------------------------------
// Primitive accessors
// ---------------------------------------------------------------------------

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

/// A key counts as present only when it holds a non-null value.
fn present<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn as_object<'a>(value: &'a Value, path: &str) -> ValidationResult<&'a Object> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::type_mismatch(path, "object"))
}

fn required<'a>(obj: &'a Object, key: &str, path: &str) -> ValidationResult<&'a Value> {
    present(obj, key).ok_or_else(|| ValidationError::missing_field(join(path, key)))
}

fn req_string(obj: &Object, key: &str, path: &str) -> ValidationResult<String> {
    required(obj, key, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::type_mismatch(join(path, key), "string"))
}

/// Required string that must not be blank.
fn req_nonempty(obj: &Object, key: &str, path: &str) -> ValidationResult<String> {
    let s = req_string(obj, key, path)?;
    if s.trim().is_empty() {
        return Err(ValidationError::missing_field(join(path, key)));
    }
    Ok(s)
}

fn opt_string(obj: &Object, key: &str, path: &str) -> ValidationResult<Option<String>> {
    match present(obj, key) {
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| ValidationError::type_mismatch(join(path, key), "string")),
        None => Ok(None),
    }
}

fn opt_bool(obj: &Object, key: &str, path: &str) -> ValidationResult<Option<bool>> {
    match present(obj, key) {
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| ValidationError::type_mismatch(join(path, key), "boolean")),
        None => Ok(None),
    }
}

fn opt_f64(obj: &Object, key: &str, path: &str) -> ValidationResult<Option<f64>> {
    match present(obj, key) {
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ValidationError::type_mismatch(join(path, key), "number")),
        None => Ok(None),
    }
}

fn opt_u64(obj: &Object, key: &str, path: &str) -> ValidationResult<Option<u64>> {
    match present(obj, key) {
        Some(v) => match v.as_u64() {
            Some(n) => Ok(Some(n)),
            None if v.as_i64().is_some() => Err(ValidationError::out_of_range(
                join(path, key),
                "must be >= 0",
            )),
            None => Err(ValidationError::type_mismatch(join(path, key), "non-negative integer")),
        },
        None => Ok(None),
    }
}

/// Optional number in `0.0..=1.0`.
fn opt_unit(obj: &Object, key: &str, path: &str) -> ValidationResult<Option<f64>> {
    let value = opt_f64(obj, key, path)?;
    if let Some(v) = value {
        check_between(v, 0.0, 1.0, &join(path, key))?;
    }
    Ok(value)
}

fn req_dimension(obj: &Object, key: &str, path: &str) -> ValidationResult<u32> {
    let field = join(path, key);
    let value = required(obj, key, path)?;
    let n = value
        .as_u64()
        .ok_or_else(|| ValidationError::type_mismatch(&field, "positive integer"))?;
    if n == 0 || n > u64::from(u32::MAX) {
        return Err(ValidationError::out_of_range(field, "must be a positive 32-bit integer"));
    }
    Ok(n as u32)
}

fn opt_array<'a>(obj: &'a Object, key: &str, path: &str) -> ValidationResult<&'a [Value]> {
    match present(obj, key) {
        Some(v) => v
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| ValidationError::type_mismatch(join(path, key), "array")),
        None => Ok(&[]),
    }
}

/// Map every element of an optional array, with `key[i]` paths.
fn list<T>(
    obj: &Object,
    key: &str,
    path: &str,
    item: impl Fn(&Value, &str) -> ValidationResult<T>,
) -> ValidationResult<Vec<T>> {
    let list_path = join(path, key);
    opt_array(obj, key, path)?
        .iter()
        .enumerate()
        .map(|(i, v)| item(v, &index(&list_path, i)))
        .collect()
}

fn check_min(value: f64, min: f64, path: &str) -> ValidationResult<()> {
    if value < min || value.is_nan() {
        return Err(ValidationError::out_of_range(path, format!("must be >= {}", min)));
    }
    Ok(())
}

fn check_positive(value: f64, path: &str) -> ValidationResult<()> {
    if value <= 0.0 || value.is_nan() {
        return Err(ValidationError::out_of_range(path, "must be > 0"));
    }
    Ok(())
}

fn check_between(value: f64, min: f64, max: f64, path: &str) -> ValidationResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::out_of_range(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}
