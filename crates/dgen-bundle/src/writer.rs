//! Project writer with folder-rename reconciliation.
//!
//! After the authoring backend saves, the bundle may no longer live at
//! `<root>/<bundle_id>`: editors are known to rename a draft folder to their
//! internal draft ID as a side effect of saving. The writer settles the
//! final location through a small state machine:
//!
//! ```text
//! save ──► content at expected path ───────────────► Written
//!   │
//!   └──► missing ──► renamed candidate found ──► RenamedDetected
//!                        │                           │
//!                        │                 content present ──► Reconciled
//!                        ▼                           │
//!                  no candidate ◄──── content absent ┘
//!                        │
//!                        └──► recreate at expected path ──► FallbackRecreated
//! ```
//!
//! The returned [`WriteReport::bundle_path`] is authoritative.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use dgen_models::Project;

use crate::assets::stage_assets;
use crate::author::{DraftAuthor, JsonDraftAuthor};
use crate::content::{materials_for, write_json_atomic, DraftContent, DraftHeader, DraftMeta, CONTENT_FILE, META_FILE};
use crate::error::{BundleError, BundleResult, IoContext};

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    /// Content found where it was written
    Written,
    /// Content missing; a renamed bundle with our ID was found
    RenamedDetected,
    /// The renamed bundle holds the content and is the final location
    Reconciled,
    /// Content recreated at the expected path without the author
    FallbackRecreated,
}

impl WriteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteState::Written => "written",
            WriteState::RenamedDetected => "renamed_detected",
            WriteState::Reconciled => "reconciled",
            WriteState::FallbackRecreated => "fallback_recreated",
        }
    }

    /// Whether this is a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WriteState::RenamedDetected)
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of [`ProjectWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    /// Final bundle directory
    pub bundle_path: PathBuf,
    /// Terminal state
    pub state: WriteState,
    /// Every state visited, in order
    pub transitions: Vec<WriteState>,
    /// Editor-internal draft ID recorded in the metadata file
    pub draft_id: String,
}

/// Materializes assembled projects as bundles.
#[derive(Clone)]
pub struct ProjectWriter {
    author: Arc<dyn DraftAuthor>,
    allow_replace: bool,
}

impl fmt::Debug for ProjectWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectWriter")
            .field("author", &self.author.name())
            .field("allow_replace", &self.allow_replace)
            .finish()
    }
}

impl Default for ProjectWriter {
    fn default() -> Self {
        Self::json()
    }
}

impl ProjectWriter {
    pub fn new(author: Arc<dyn DraftAuthor>) -> Self {
        Self {
            author,
            allow_replace: true,
        }
    }

    /// Writer using the built-in JSON author.
    pub fn json() -> Self {
        Self::new(Arc::new(JsonDraftAuthor))
    }

    /// Replace an existing bundle directory with the same ID (default on).
    pub fn allow_replace(mut self, allow: bool) -> Self {
        self.allow_replace = allow;
        self
    }

    /// Write `project` as `<output_root>/<bundle_id>`.
    ///
    /// Blocking. Not safe to run concurrently with another write into the
    /// same root unless bundle IDs are unique.
    pub fn write(&self, project: &Project, output_root: &Path, bundle_id: &str) -> BundleResult<WriteReport> {
        validate_bundle_id(bundle_id)?;
        std::fs::create_dir_all(output_root).at(output_root)?;

        let expected = output_root.join(bundle_id);
        if expected.exists() {
            if !self.allow_replace {
                return Err(BundleError::AlreadyExists(expected));
            }
            debug!(path = %expected.display(), "Replacing existing bundle");
            std::fs::remove_dir_all(&expected).at(&expected)?;
        }

        let header = DraftHeader::for_project(project, bundle_id);
        info!(
            bundle_id = %bundle_id,
            author = %self.author.name(),
            tracks = project.tracks.len(),
            segments = project.segment_count(),
            "Writing bundle"
        );

        let asset_paths = stage_assets(output_root, &expected, &project.media())?;
        self.author_draft(project, &expected, &header, &asset_paths)?;

        let report = reconcile(project, output_root, &expected, &header)?;
        counter!("dgen_bundle_writes_total", "state" => report.state.as_str()).increment(1);
        info!(
            bundle_id = %bundle_id,
            path = %report.bundle_path.display(),
            state = %report.state,
            "Bundle written"
        );
        Ok(report)
    }

    fn author_draft(
        &self,
        project: &Project,
        bundle_dir: &Path,
        header: &DraftHeader,
        asset_paths: &HashMap<String, String>,
    ) -> BundleResult<()> {
        let materials = materials_for(project, asset_paths);
        let mut session = self.author.create(bundle_dir, header)?;

        for resource in project.media() {
            if let Some(material) = materials.get(&resource.url) {
                session.add_material(material)?;
            }
        }
        for (index, track) in project.description.tracks.iter().enumerate() {
            session.add_track(index, track)?;
            for view in project.track_segments(index) {
                let material = view.media.and_then(|m| materials.get(&m.url));
                session.add_segment(&view, material)?;
            }
        }
        session.save()
    }
}

fn reconcile(project: &Project, root: &Path, expected: &Path, header: &DraftHeader) -> BundleResult<WriteReport> {
    let mut transitions = Vec::with_capacity(2);

    if expected.join(CONTENT_FILE).is_file() {
        transitions.push(WriteState::Written);
        return Ok(report(expected, transitions, header));
    }

    warn!(path = %expected.display(), "Content file missing after save, looking for renamed bundle");

    if let Some(candidate) = find_renamed(root, &header.bundle_id) {
        transitions.push(WriteState::RenamedDetected);
        info!(
            bundle_id = %header.bundle_id,
            candidate = %candidate.display(),
            "Renamed bundle detected"
        );
        if candidate.join(CONTENT_FILE).is_file() {
            transitions.push(WriteState::Reconciled);
            let mut report = report(&candidate, transitions, header);
            if let Some(meta) = DraftMeta::read(&candidate) {
                report.draft_id = meta.draft_id;
            }
            return Ok(report);
        }
        warn!(candidate = %candidate.display(), "Renamed bundle has no content file");
    }

    recreate(project, root, expected, header)?;
    transitions.push(WriteState::FallbackRecreated);
    Ok(report(expected, transitions, header))
}

fn report(path: &Path, transitions: Vec<WriteState>, header: &DraftHeader) -> WriteReport {
    WriteReport {
        bundle_path: path.to_path_buf(),
        state: transitions.last().copied().unwrap_or(WriteState::Written),
        transitions,
        draft_id: header.draft_id.clone(),
    }
}

/// Most recently saved bundle under `root` whose metadata names `bundle_id`,
/// resolved to `<root>/<draft_id>` when that directory exists.
fn find_renamed(root: &Path, bundle_id: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;

    let (_, dir, meta) = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| {
            let dir = e.path();
            let meta = DraftMeta::read(&dir).filter(|m| m.draft_name == bundle_id)?;
            let modified = std::fs::metadata(dir.join(META_FILE))
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, dir, meta))
        })
        .max_by_key(|(modified, _, _)| *modified)?;

    let by_id = root.join(&meta.draft_id);
    if !meta.draft_id.is_empty() && by_id.is_dir() {
        Some(by_id)
    } else {
        Some(dir)
    }
}

/// Write content, metadata and assets at `bundle_dir` directly.
fn recreate(project: &Project, root: &Path, bundle_dir: &Path, header: &DraftHeader) -> BundleResult<()> {
    warn!(path = %bundle_dir.display(), "Recreating bundle without the authoring backend");
    std::fs::create_dir_all(bundle_dir).at(bundle_dir)?;

    let asset_paths = stage_assets(root, bundle_dir, &project.media())?;
    let content = DraftContent::from_project(header, project, &asset_paths);
    write_json_atomic(&bundle_dir.join(CONTENT_FILE), &content)?;
    write_json_atomic(&bundle_dir.join(META_FILE), &DraftMeta::new(header, bundle_dir))?;

    if !bundle_dir.join(CONTENT_FILE).is_file() {
        return Err(BundleError::reconciliation(bundle_dir, "content file still missing after recreation"));
    }
    Ok(())
}

/// Bundle IDs become directory names: no separators, no reserved characters.
pub fn validate_bundle_id(bundle_id: &str) -> BundleResult<()> {
    let invalid = bundle_id.is_empty()
        || bundle_id.len() > 255
        || bundle_id == "."
        || bundle_id == ".."
        || bundle_id.trim() != bundle_id
        || bundle_id
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'));
    if invalid {
        return Err(BundleError::InvalidBundleId(bundle_id.to_string()));
    }
    Ok(())
}
