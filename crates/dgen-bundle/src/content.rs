//! Content and metadata documents stored in a bundle.
//!
//! This is the only place where pipeline milliseconds become the editor's
//! microseconds. Media is referenced by bundle-relative `Assets/<file>`
//! paths so the editor renaming the bundle directory does not break links.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use dgen_models::{MediaKind, MediaResource, Project, SegmentPayload, SegmentView, TimeRange, TrackDescription};

use crate::error::{BundleResult, IoContext};

/// Primary content file (tracks/segments tree).
pub const CONTENT_FILE: &str = "draft_content.json";

/// Bundle metadata file. Its content is opaque to the scanner.
pub const META_FILE: &str = "draft_meta_info.json";

/// Media folder inside a bundle.
pub const ASSETS_DIR: &str = "Assets";

const CONTENT_VERSION: u32 = 360000;

/// Milliseconds to microseconds.
pub fn ms_to_us(ms: u64) -> u64 {
    ms.saturating_mul(1000)
}

/// New editor-style identifier (uppercase UUID) for drafts, tracks,
/// segments and materials.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().to_uppercase()
}

/// `{start, duration}` in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timerange {
    pub start: u64,
    pub duration: u64,
}

impl From<&TimeRange> for Timerange {
    fn from(range: &TimeRange) -> Self {
        Self {
            start: ms_to_us(range.start),
            duration: ms_to_us(range.duration_ms()),
        }
    }
}

impl Timerange {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.duration)
    }
}

/// Canvas settings of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub ratio: String,
}

/// A media file referenced by segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMaterial {
    pub id: String,
    /// `video`, `audio` or `photo`
    #[serde(rename = "type")]
    pub kind: String,
    /// Bundle-relative path, e.g. `Assets/a.mp4`
    pub path: String,
    pub material_name: String,
    /// Microseconds
    pub duration: u64,
    /// Remote origin
    pub source_url: String,
}

impl ContentMaterial {
    pub fn new(resource: &MediaResource, relative_path: &str) -> Self {
        let kind = match resource.kind {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "photo",
        };
        let material_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        Self {
            id: new_id(),
            kind: kind.to_string(),
            path: relative_path.to_string(),
            material_name,
            duration: ms_to_us(resource.duration_ms),
            source_url: resource.url.clone(),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == "audio"
    }
}

/// One segment of a content track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSegment {
    pub id: String,
    pub material_id: Option<String>,
    pub target_timerange: Timerange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timerange: Option<Timerange>,
    pub speed: f64,
    pub volume: f64,
    pub visible: bool,
    /// Kind-specific properties as given in the input
    pub payload: SegmentPayload,
}

impl ContentSegment {
    pub fn from_view(view: &SegmentView<'_>, material: Option<&ContentMaterial>) -> Self {
        let payload = &view.segment.payload;
        let (speed, volume) = match payload {
            SegmentPayload::Video(v) => (v.speed, v.volume),
            SegmentPayload::Audio(a) => (a.speed, a.volume),
            _ => (None, None),
        };
        let speed = speed.unwrap_or(1.0);

        // Without an explicit trim, the source span is the target span scaled by speed.
        let source_timerange = match payload.material_range() {
            Some(range) => Some(Timerange::from(range)),
            None if material.is_some() && view.media.is_some_and(|m| m.kind != MediaKind::Image) => {
                Some(Timerange {
                    start: 0,
                    duration: (ms_to_us(view.segment.time_range.duration_ms()) as f64 * speed).round() as u64,
                })
            }
            None => None,
        };

        Self {
            id: view.id.to_string(),
            material_id: material.map(|m| m.id.clone()),
            target_timerange: Timerange::from(&view.segment.time_range),
            source_timerange,
            speed,
            volume: volume.unwrap_or(1.0),
            visible: true,
            payload: payload.clone(),
        }
    }
}

/// One track of the content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTrack {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// 1 when muted
    pub attribute: u32,
    pub volume: f64,
    pub segments: Vec<ContentSegment>,
}

impl ContentTrack {
    pub fn new(index: usize, track: &TrackDescription) -> Self {
        Self {
            id: new_id(),
            kind: track.kind.to_string(),
            name: track
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{}", track.kind, index)),
            attribute: u32::from(track.muted),
            volume: track.volume,
            segments: Vec::new(),
        }
    }

    /// Track end in microseconds.
    pub fn end_us(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.target_timerange.end())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMaterials {
    pub videos: Vec<ContentMaterial>,
    pub audios: Vec<ContentMaterial>,
}

impl ContentMaterials {
    pub fn push(&mut self, material: ContentMaterial) {
        if material.is_audio() {
            self.audios.push(material);
        } else {
            self.videos.push(material);
        }
    }
}

/// The primary content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContent {
    pub id: String,
    pub name: String,
    pub canvas_config: CanvasConfig,
    pub fps: f64,
    /// Microseconds
    pub duration: u64,
    pub tracks: Vec<ContentTrack>,
    pub materials: ContentMaterials,
    pub create_time: i64,
    pub update_time: i64,
    pub version: u32,
}

impl DraftContent {
    pub fn new(header: &DraftHeader) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: header.draft_id.clone(),
            name: header.project_name.clone(),
            canvas_config: CanvasConfig {
                width: header.width,
                height: header.height,
                ratio: "original".to_string(),
            },
            fps: f64::from(header.fps),
            duration: 0,
            tracks: Vec::new(),
            materials: ContentMaterials::default(),
            create_time: now,
            update_time: now,
            version: CONTENT_VERSION,
        }
    }

    /// Recompute the total duration from the tracks.
    pub fn refresh_duration(&mut self) {
        self.duration = self.tracks.iter().map(ContentTrack::end_us).max().unwrap_or(0);
    }

    /// Build the complete document for `project` in one go.
    pub fn from_project(
        header: &DraftHeader,
        project: &Project,
        asset_paths: &HashMap<String, String>,
    ) -> Self {
        let mut content = Self::new(header);
        let materials = materials_for(project, asset_paths);
        for resource in project.media() {
            if let Some(m) = materials.get(&resource.url) {
                content.materials.push(m.clone());
            }
        }
        for (index, track) in project.description.tracks.iter().enumerate() {
            let mut content_track = ContentTrack::new(index, track);
            for view in project.track_segments(index) {
                let material = view.media.and_then(|m| materials.get(&m.url));
                content_track.segments.push(ContentSegment::from_view(&view, material));
            }
            content.tracks.push(content_track);
        }
        content.refresh_duration();
        content
    }
}

/// One material per distinct URL, keyed by URL.
pub fn materials_for(project: &Project, asset_paths: &HashMap<String, String>) -> HashMap<String, ContentMaterial> {
    project
        .media()
        .into_iter()
        .filter_map(|resource| {
            let path = asset_paths.get(&resource.url)?;
            Some((resource.url.clone(), ContentMaterial::new(resource, path)))
        })
        .collect()
}

/// Identity and canvas of a bundle being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftHeader {
    /// Editor-internal ID recorded in the metadata file
    pub draft_id: String,
    /// Caller-chosen bundle ID, recorded as the draft name
    pub bundle_id: String,
    pub project_name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_ms: u64,
}

impl DraftHeader {
    pub fn for_project(project: &Project, bundle_id: &str) -> Self {
        let d = &project.description;
        Self {
            draft_id: new_id(),
            bundle_id: bundle_id.to_string(),
            project_name: d.name.clone(),
            width: d.width,
            height: d.height,
            fps: d.fps,
            duration_ms: project.duration_ms,
        }
    }
}

/// The metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftMeta {
    pub draft_id: String,
    pub draft_name: String,
    pub draft_fold_path: String,
    pub draft_root_path: String,
    #[serde(default)]
    pub draft_timeline_materials_size: u64,
    #[serde(default)]
    pub tm_draft_create: i64,
    #[serde(default)]
    pub tm_draft_modified: i64,
    /// Microseconds
    #[serde(default)]
    pub tm_duration: u64,
}

impl DraftMeta {
    pub fn new(header: &DraftHeader, bundle_dir: &Path) -> Self {
        let now_us = Utc::now().timestamp_micros();
        Self {
            draft_id: header.draft_id.clone(),
            draft_name: header.bundle_id.clone(),
            draft_fold_path: slash_path(bundle_dir),
            draft_root_path: bundle_dir.parent().map(slash_path).unwrap_or_default(),
            draft_timeline_materials_size: dir_size(&bundle_dir.join(ASSETS_DIR)),
            tm_draft_create: now_us,
            tm_draft_modified: now_us,
            tm_duration: ms_to_us(header.duration_ms),
        }
    }

    /// Read a metadata file; `None` when missing or unreadable.
    pub fn read(bundle_dir: &Path) -> Option<Self> {
        let bytes = std::fs::read(bundle_dir.join(META_FILE)).ok()?;
        serde_json::from_slice(strip_bom(&bytes)).ok()
    }
}

/// Forward-slash rendering of a path.
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// Total size in bytes of all files below `dir`; 0 when absent.
pub fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => dir_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}

/// Serialize `value` to `path` via a temporary file and rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> BundleResult<()> {
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes).at(&tmp)?;
    std::fs::rename(&tmp, path).at(path)?;
    Ok(())
}
