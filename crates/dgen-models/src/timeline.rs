//! Timeline assembly.
//!
//! [`assemble`] turns a validated [`ProjectDescription`] plus the resolved
//! media map into a [`Project`]: every segment gets a fresh [`SegmentId`],
//! media references are bound to their [`MediaResource`], and track and
//! project durations are computed. Input order is preserved exactly since
//! it becomes the stacking order in the editor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AssemblyError, AssemblyResult};
use crate::media::{MediaKind, MediaResource};
use crate::project::{ProjectDescription, TrackDescription};
use crate::segment::SegmentDescription;

/// Unique identifier of an assembled segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Generate a new random segment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-segment assembly result, parallel to the description's segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledSegment {
    pub id: SegmentId,
    /// Bound media for video/image/audio segments
    pub media: Option<MediaResource>,
}

/// Per-track assembly result, parallel to the description's tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledTrack {
    pub segments: Vec<AssembledSegment>,
    /// `max(segment.end)`, 0 for an empty track
    pub duration_ms: u64,
}

/// A fully assembled project, ready to be written.
///
/// Never mutated after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub description: ProjectDescription,
    pub tracks: Vec<AssembledTrack>,
    pub duration_ms: u64,
}

/// Borrowed view of one segment with everything a writer needs.
#[derive(Debug, Clone, Copy)]
pub struct SegmentView<'a> {
    pub track_index: usize,
    pub segment_index: usize,
    pub track: &'a TrackDescription,
    pub segment: &'a SegmentDescription,
    pub id: &'a SegmentId,
    pub media: Option<&'a MediaResource>,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.description.name
    }

    pub fn segment_count(&self) -> usize {
        self.tracks.iter().map(|t| t.segments.len()).sum()
    }

    /// Segments of track `track_index` in input order.
    pub fn track_segments(&self, track_index: usize) -> impl Iterator<Item = SegmentView<'_>> {
        let track = self.description.tracks.get(track_index);
        let assembled = self.tracks.get(track_index);
        track
            .zip(assembled)
            .into_iter()
            .flat_map(move |(track, assembled)| {
                track
                    .segments
                    .iter()
                    .zip(assembled.segments.iter())
                    .enumerate()
                    .map(move |(segment_index, (segment, a))| SegmentView {
                        track_index,
                        segment_index,
                        track,
                        segment,
                        id: &a.id,
                        media: a.media.as_ref(),
                    })
            })
    }

    /// All segments, track by track, in input order.
    pub fn segments(&self) -> impl Iterator<Item = SegmentView<'_>> {
        (0..self.tracks.len()).flat_map(move |i| self.track_segments(i))
    }

    /// Distinct media resources in first-reference order.
    pub fn media(&self) -> Vec<&MediaResource> {
        let mut seen = std::collections::HashSet::new();
        self.segments()
            .filter_map(|s| s.media)
            .filter(|m| seen.insert(m.url.as_str()))
            .collect()
    }
}

/// Assemble a project from a validated description and resolved media.
///
/// Any segment whose media is missing from `resources` fails the whole
/// assembly; partial projects are never produced.
pub fn assemble(
    description: ProjectDescription,
    resources: &HashMap<String, MediaResource>,
) -> AssemblyResult<Project> {
    if description.tracks.is_empty() {
        return Err(AssemblyError::Empty);
    }

    let mut tracks = Vec::with_capacity(description.tracks.len());

    for (track_index, track) in description.tracks.iter().enumerate() {
        let mut segments = Vec::with_capacity(track.segments.len());
        let mut duration_ms = 0;

        for (segment_index, segment) in track.segments.iter().enumerate() {
            let kind = segment.kind();
            if !track.kind.accepts(kind) {
                return Err(AssemblyError::KindMismatch {
                    track_index,
                    segment_index,
                    track_kind: track.kind.to_string(),
                    segment_kind: kind.to_string(),
                });
            }

            if !segment.time_range.is_valid() {
                return Err(AssemblyError::InvalidTimeRange {
                    track_index,
                    segment_index,
                    range: segment.time_range.to_string(),
                });
            }

            let media = match segment.material_url() {
                Some(url) => {
                    let resource = resources.get(url).ok_or_else(|| AssemblyError::UnresolvedMedia {
                        track_index,
                        segment_index,
                        url: url.to_string(),
                    })?;
                    check_material_range(segment, resource, track_index, segment_index)?;
                    Some(resource.clone())
                }
                None => None,
            };

            duration_ms = duration_ms.max(segment.time_range.end);
            segments.push(AssembledSegment {
                id: SegmentId::new(),
                media,
            });
        }

        debug!(
            track_index,
            kind = %track.kind,
            segments = segments.len(),
            duration_ms,
            "Track assembled"
        );
        tracks.push(AssembledTrack {
            segments,
            duration_ms,
        });
    }

    let duration_ms = tracks.iter().map(|t| t.duration_ms).max().unwrap_or(0);

    info!(
        name = %description.name,
        tracks = tracks.len(),
        duration_ms,
        "Project assembled"
    );

    Ok(Project {
        description,
        tracks,
        duration_ms,
    })
}

fn check_material_range(
    segment: &SegmentDescription,
    resource: &MediaResource,
    track_index: usize,
    segment_index: usize,
) -> AssemblyResult<()> {
    let Some(range) = segment.payload.material_range() else {
        return Ok(());
    };
    if resource.kind == MediaKind::Image {
        return Ok(());
    }
    if range.end > resource.duration_ms {
        return Err(AssemblyError::MaterialRangeExceedsMedia {
            track_index,
            segment_index,
            range: range.to_string(),
            duration_ms: resource.duration_ms,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::TrackKind;
    use crate::segment::{AudioPayload, SegmentPayload, TextPayload, VideoPayload};
    use crate::time::TimeRange;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn resource(url: &str, duration_ms: u64) -> MediaResource {
        MediaResource {
            url: url.to_string(),
            local_path: PathBuf::from("/tmp/a.mp4"),
            duration_ms,
            format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            kind: MediaKind::Video,
            size_bytes: 1024,
            resolved_at: Utc::now(),
        }
    }

    fn video(url: &str, start: u64, end: u64) -> SegmentDescription {
        SegmentDescription::new(
            TimeRange::new(start, end),
            SegmentPayload::Video(VideoPayload {
                material_url: url.to_string(),
                ..Default::default()
            }),
        )
    }

    fn text(start: u64, end: u64) -> SegmentDescription {
        SegmentDescription::new(
            TimeRange::new(start, end),
            SegmentPayload::Text(TextPayload {
                content: "caption".to_string(),
                ..Default::default()
            }),
        )
    }

    fn description(tracks: Vec<TrackDescription>) -> ProjectDescription {
        ProjectDescription {
            draft_id: None,
            name: "demo".to_string(),
            width: 1920,
            height: 1080,
            fps: 30,
            tracks,
        }
    }

    #[test]
    fn test_single_video_segment() {
        let desc = description(vec![
            TrackDescription::new(TrackKind::Video).with_segment(video("https://x/a.mp4", 0, 5000)),
        ]);
        let resources = HashMap::from([("https://x/a.mp4".to_string(), resource("https://x/a.mp4", 5000))]);

        let project = assemble(desc, &resources).unwrap();
        assert_eq!(project.duration_ms, 5000);
        assert_eq!(project.tracks[0].duration_ms, 5000);
        assert_eq!(project.segment_count(), 1);
        assert_eq!(project.media().len(), 1);
    }

    #[test]
    fn test_segment_ids_are_unique_and_one_per_segment() {
        let desc = description(vec![
            TrackDescription::new(TrackKind::Text)
                .with_segment(text(0, 1000))
                .with_segment(text(1000, 2000))
                .with_segment(text(0, 1000)),
            TrackDescription::new(TrackKind::Text).with_segment(text(500, 700)),
        ]);

        let project = assemble(desc, &HashMap::new()).unwrap();
        let ids: HashSet<_> = project.segments().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(project.segment_count(), 4);
    }

    #[test]
    fn test_order_is_preserved() {
        let desc = description(vec![
            TrackDescription::new(TrackKind::Text)
                .with_segment(text(3000, 4000))
                .with_segment(text(0, 1000)),
            TrackDescription::new(TrackKind::Text).with_segment(text(200, 300)),
        ]);

        let project = assemble(desc, &HashMap::new()).unwrap();
        let starts: Vec<_> = project
            .segments()
            .map(|s| (s.track_index, s.segment.time_range.start))
            .collect();
        assert_eq!(starts, vec![(0, 3000), (0, 0), (1, 200)]);
    }

    #[test]
    fn test_durations_use_max_end() {
        let desc = description(vec![
            TrackDescription::new(TrackKind::Text)
                .with_segment(text(0, 8000))
                .with_segment(text(1000, 2000)),
            TrackDescription::new(TrackKind::Effect),
        ]);

        let project = assemble(desc, &HashMap::new()).unwrap();
        assert_eq!(project.tracks[0].duration_ms, 8000);
        assert_eq!(project.tracks[1].duration_ms, 0);
        assert_eq!(project.duration_ms, 8000);
    }

    #[test]
    fn test_unresolved_media_names_segment() {
        let desc = description(vec![TrackDescription::new(TrackKind::Video)
            .with_segment(video("https://x/a.mp4", 0, 1000))
            .with_segment(video("https://x/missing.mp4", 1000, 2000))]);
        let resources = HashMap::from([("https://x/a.mp4".to_string(), resource("https://x/a.mp4", 5000))]);

        let err = assemble(desc, &resources).unwrap_err();
        assert_eq!(
            err,
            AssemblyError::UnresolvedMedia {
                track_index: 0,
                segment_index: 1,
                url: "https://x/missing.mp4".to_string(),
            }
        );
    }

    #[test]
    fn test_unreferenced_failures_do_not_matter() {
        let desc = description(vec![
            TrackDescription::new(TrackKind::Video).with_segment(video("https://x/a.mp4", 0, 1000)),
        ]);
        let resources = HashMap::from([
            ("https://x/a.mp4".to_string(), resource("https://x/a.mp4", 5000)),
            ("https://x/b.mp4".to_string(), resource("https://x/b.mp4", 5000)),
        ]);
        assert!(assemble(desc, &resources).is_ok());
    }

    #[test]
    fn test_kind_mismatch() {
        let audio = SegmentDescription::new(
            TimeRange::new(0, 1000),
            SegmentPayload::Audio(AudioPayload {
                material_url: "https://x/a.mp3".to_string(),
                ..Default::default()
            }),
        );
        let desc = description(vec![
            TrackDescription::new(TrackKind::Text).with_segment(text(0, 10)),
            TrackDescription::new(TrackKind::Text)
                .with_segment(text(0, 10))
                .with_segment(audio),
        ]);

        let err = assemble(desc, &HashMap::new()).unwrap_err();
        assert!(matches!(err, AssemblyError::KindMismatch { .. }));
        assert_eq!(err.location(), Some((1, 1)));
    }

    #[test]
    fn test_material_range_beyond_media() {
        let seg = SegmentDescription::new(
            TimeRange::new(0, 3000),
            SegmentPayload::Video(VideoPayload {
                material_url: "https://x/a.mp4".to_string(),
                material_range: Some(TimeRange::new(2000, 5000)),
                ..Default::default()
            }),
        );
        let desc = description(vec![TrackDescription::new(TrackKind::Video).with_segment(seg)]);
        let resources = HashMap::from([("https://x/a.mp4".to_string(), resource("https://x/a.mp4", 4000))]);

        let err = assemble(desc, &resources).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::MaterialRangeExceedsMedia { duration_ms: 4000, .. }
        ));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let desc = description(vec![TrackDescription::new(TrackKind::Text).with_segment(text(5000, 3000))]);
        let err = assemble(desc, &HashMap::new()).unwrap_err();
        assert_eq!(err.location(), Some((0, 0)));
    }

    #[test]
    fn test_empty_project() {
        assert_eq!(assemble(description(vec![]), &HashMap::new()).unwrap_err(), AssemblyError::Empty);
    }
}
