//! Draft authoring backend.
//!
//! The writer drives a [`DraftAuthor`] through a fixed call order: create
//! the bundle, add tracks in project order, add each track's segments in
//! project order, then save. Implementations may rename the bundle
//! directory as a side effect of `save`; the writer reconciles afterwards.

use std::path::{Path, PathBuf};
use tracing::debug;

use dgen_models::{SegmentView, TrackDescription};

use crate::content::{
    write_json_atomic, ContentMaterial, ContentSegment, ContentTrack, DraftContent, DraftHeader, DraftMeta,
    CONTENT_FILE, META_FILE,
};
use crate::error::{BundleError, BundleResult, IoContext};

/// Factory for authoring sessions.
pub trait DraftAuthor: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Start a new draft at `bundle_dir`.
    fn create(&self, bundle_dir: &Path, header: &DraftHeader) -> BundleResult<Box<dyn DraftSession>>;
}

/// An open draft. Dropping it without `save` discards the draft.
pub trait DraftSession: Send {
    fn add_material(&mut self, material: &ContentMaterial) -> BundleResult<()>;

    /// Append a track. Tracks are added in stacking order.
    fn add_track(&mut self, index: usize, track: &TrackDescription) -> BundleResult<()>;

    /// Append a segment to the track at `view.track_index`.
    fn add_segment(&mut self, view: &SegmentView<'_>, material: Option<&ContentMaterial>) -> BundleResult<()>;

    /// Persist the draft. May move the bundle directory.
    fn save(self: Box<Self>) -> BundleResult<()>;
}

/// Built-in backend writing the JSON bundle layout directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDraftAuthor;

impl DraftAuthor for JsonDraftAuthor {
    fn name(&self) -> &str {
        "json"
    }

    fn create(&self, bundle_dir: &Path, header: &DraftHeader) -> BundleResult<Box<dyn DraftSession>> {
        std::fs::create_dir_all(bundle_dir).at(bundle_dir)?;
        Ok(Box::new(JsonDraftSession {
            dir: bundle_dir.to_path_buf(),
            header: header.clone(),
            content: DraftContent::new(header),
        }))
    }
}

struct JsonDraftSession {
    dir: PathBuf,
    header: DraftHeader,
    content: DraftContent,
}

impl DraftSession for JsonDraftSession {
    fn add_material(&mut self, material: &ContentMaterial) -> BundleResult<()> {
        self.content.materials.push(material.clone());
        Ok(())
    }

    fn add_track(&mut self, index: usize, track: &TrackDescription) -> BundleResult<()> {
        if index != self.content.tracks.len() {
            return Err(BundleError::author(format!(
                "track {index} added out of order (have {})",
                self.content.tracks.len()
            )));
        }
        self.content.tracks.push(ContentTrack::new(index, track));
        Ok(())
    }

    fn add_segment(&mut self, view: &SegmentView<'_>, material: Option<&ContentMaterial>) -> BundleResult<()> {
        let track = self
            .content
            .tracks
            .get_mut(view.track_index)
            .ok_or_else(|| BundleError::author(format!("no track {} for segment", view.track_index)))?;
        track.segments.push(ContentSegment::from_view(view, material));
        Ok(())
    }

    fn save(self: Box<Self>) -> BundleResult<()> {
        let Self {
            dir,
            header,
            mut content,
        } = *self;
        content.refresh_duration();

        write_json_atomic(&dir.join(CONTENT_FILE), &content)?;
        write_json_atomic(&dir.join(META_FILE), &DraftMeta::new(&header, &dir))?;

        debug!(
            dir = %dir.display(),
            tracks = content.tracks.len(),
            duration_us = content.duration,
            "Saved draft"
        );
        Ok(())
    }
}
