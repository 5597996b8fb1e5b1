//! Writer and scanner against the built-in author and renaming fakes.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use dgen_bundle::{
    scan, BundleError, BundleResult, ContentMaterial, DraftAuthor, DraftContent, DraftHeader, DraftMeta,
    DraftSession, JsonDraftAuthor, ProjectWriter, WriteState, ASSETS_DIR, CONTENT_FILE, META_FILE,
};
use dgen_models::{assemble, validate, MediaKind, MediaResource, Project, SegmentView, TrackDescription};

const VIDEO_URL: &str = "https://x/a.mp4";
const AUDIO_URL: &str = "https://x/music.mp3";

/// Media cache with one video and one audio file.
fn media_cache() -> (TempDir, HashMap<String, MediaResource>) {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("a.mp4");
    let audio = dir.path().join("music.mp3");
    std::fs::write(&video, vec![1u8; 2048]).unwrap();
    std::fs::write(&audio, vec![2u8; 1024]).unwrap();

    let resource = |url: &str, path: PathBuf, kind, duration_ms| MediaResource {
        url: url.to_string(),
        local_path: path,
        duration_ms,
        format: "test".to_string(),
        kind,
        size_bytes: 0,
        resolved_at: Utc::now(),
    };
    let resources = HashMap::from([
        (VIDEO_URL.to_string(), resource(VIDEO_URL, video, MediaKind::Video, 5000)),
        (AUDIO_URL.to_string(), resource(AUDIO_URL, audio, MediaKind::Audio, 60_000)),
    ]);
    (dir, resources)
}

fn project(resources: &HashMap<String, MediaResource>) -> Project {
    let description = validate(
        r#"{
            "project": {"name": "Demo", "width": 1920, "height": 1080, "fps": 30},
            "tracks": [
                {"track_type": "video", "segments": [
                    {"kind": "video", "material_url": "https://x/a.mp4", "time_range": {"start": 0, "end": 5000}}
                ]},
                {"track_type": "audio", "segments": [
                    {"kind": "audio", "material_url": "https://x/music.mp3", "time_range": {"start": 0, "end": 4000},
                     "volume": 0.5}
                ]},
                {"track_type": "text", "segments": [
                    {"kind": "text", "content": "Hello", "time_range": {"start": 500, "end": 2500}}
                ]}
            ]
        }"#,
    )
    .unwrap();
    assemble(description, resources).unwrap()
}

fn read_content(bundle: &Path) -> DraftContent {
    serde_json::from_slice(&std::fs::read(bundle.join(CONTENT_FILE)).unwrap()).unwrap()
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Save normally, then rename the folder to the draft ID.
    RenameAfterSave,
    /// Write metadata, rename, never write content.
    RenameBeforeContent,
    /// Delete the folder on save.
    Vanish,
}

/// Author that misbehaves on save the way editors have been seen to.
struct RenamingAuthor {
    mode: Mode,
}

struct RenamingSession {
    mode: Mode,
    dir: PathBuf,
    header: DraftHeader,
    inner: Box<dyn DraftSession>,
}

impl DraftAuthor for RenamingAuthor {
    fn name(&self) -> &str {
        "renaming"
    }

    fn create(&self, bundle_dir: &Path, header: &DraftHeader) -> BundleResult<Box<dyn DraftSession>> {
        Ok(Box::new(RenamingSession {
            mode: self.mode,
            dir: bundle_dir.to_path_buf(),
            header: header.clone(),
            inner: JsonDraftAuthor.create(bundle_dir, header)?,
        }))
    }
}

impl DraftSession for RenamingSession {
    fn add_material(&mut self, material: &ContentMaterial) -> BundleResult<()> {
        self.inner.add_material(material)
    }

    fn add_track(&mut self, index: usize, track: &TrackDescription) -> BundleResult<()> {
        self.inner.add_track(index, track)
    }

    fn add_segment(&mut self, view: &SegmentView<'_>, material: Option<&ContentMaterial>) -> BundleResult<()> {
        self.inner.add_segment(view, material)
    }

    fn save(self: Box<Self>) -> BundleResult<()> {
        let renamed = self.dir.parent().unwrap().join(&self.header.draft_id);
        match self.mode {
            Mode::RenameAfterSave => {
                self.inner.save()?;
                std::fs::rename(&self.dir, renamed).unwrap();
            }
            Mode::RenameBeforeContent => {
                let meta = DraftMeta::new(&self.header, &self.dir);
                std::fs::write(self.dir.join(META_FILE), serde_json::to_vec(&meta).unwrap()).unwrap();
                std::fs::rename(&self.dir, renamed).unwrap();
            }
            Mode::Vanish => {
                std::fs::remove_dir_all(&self.dir).unwrap();
            }
        }
        Ok(())
    }
}

struct FailingAuthor;

impl DraftAuthor for FailingAuthor {
    fn name(&self) -> &str {
        "failing"
    }

    fn create(&self, _bundle_dir: &Path, _header: &DraftHeader) -> BundleResult<Box<dyn DraftSession>> {
        Err(BundleError::author("editor not installed"))
    }
}

#[test]
fn test_write_then_scan() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let report = ProjectWriter::json().write(&project, root.path(), "bundle-1").unwrap();
    assert_eq!(report.state, WriteState::Written);
    assert_eq!(report.transitions, vec![WriteState::Written]);
    assert_eq!(report.bundle_path, root.path().join("bundle-1"));

    let content = read_content(&report.bundle_path);
    assert_eq!(content.duration, 5_000_000);
    assert_eq!(content.canvas_config.width, 1920);
    let kinds: Vec<_> = content.tracks.iter().map(|t| t.kind.as_str()).collect();
    assert_eq!(kinds, ["video", "audio", "text"]);

    assert_eq!(content.materials.videos.len(), 1);
    assert_eq!(content.materials.videos[0].path, "Assets/a.mp4");
    assert_eq!(content.materials.audios[0].path, "Assets/music.mp3");
    assert!(report.bundle_path.join(ASSETS_DIR).join("a.mp4").is_file());

    let text = &content.tracks[2].segments[0];
    assert_eq!(text.target_timerange.start, 500_000);
    assert_eq!(text.target_timerange.duration, 2_000_000);
    assert!(text.material_id.is_none());
    assert_eq!(content.tracks[1].segments[0].volume, 0.5);

    let meta = DraftMeta::read(&report.bundle_path).unwrap();
    assert_eq!(meta.draft_name, "bundle-1");
    assert_eq!(meta.draft_id, report.draft_id);
    assert_eq!(meta.tm_duration, 5_000_000);

    let index = scan(root.path()).unwrap();
    assert_eq!(index.count, 1);
    assert_eq!(index.bundles[0].duration_ms, project.duration_ms);
    assert_eq!(index.bundles[0].duration_ms, 5000);
    assert_eq!(index.bundles[0].assets_size_bytes, 3072);
    assert!(index.warnings.is_empty());
}

#[test]
fn test_rename_after_save_is_reconciled() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let writer = ProjectWriter::new(Arc::new(RenamingAuthor {
        mode: Mode::RenameAfterSave,
    }));
    let report = writer.write(&project, root.path(), "X").unwrap();

    assert_eq!(report.state, WriteState::Reconciled);
    assert_eq!(report.transitions, vec![WriteState::RenamedDetected, WriteState::Reconciled]);
    assert_eq!(report.bundle_path, root.path().join(&report.draft_id));
    assert!(report.bundle_path.join(CONTENT_FILE).is_file());
    assert!(!root.path().join("X").exists());
}

#[test]
fn test_rename_before_content_falls_back() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let writer = ProjectWriter::new(Arc::new(RenamingAuthor {
        mode: Mode::RenameBeforeContent,
    }));
    let report = writer.write(&project, root.path(), "X").unwrap();

    assert_eq!(report.state, WriteState::FallbackRecreated);
    assert_eq!(
        report.transitions,
        vec![WriteState::RenamedDetected, WriteState::FallbackRecreated]
    );
    assert_eq!(report.bundle_path, root.path().join("X"));
    assert_eq!(read_content(&report.bundle_path).duration, 5_000_000);
    assert!(report.bundle_path.join(ASSETS_DIR).join("a.mp4").is_file());

    // The content-less renamed folder is not a bundle.
    let index = scan(root.path()).unwrap();
    assert_eq!(index.count, 1);
    assert_eq!(index.bundles[0].name, "X");
    assert_eq!(index.bundles[0].duration_ms, 5000);
}

#[test]
fn test_vanished_bundle_is_recreated() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let writer = ProjectWriter::new(Arc::new(RenamingAuthor { mode: Mode::Vanish }));
    let report = writer.write(&project, root.path(), "X").unwrap();

    assert_eq!(report.state, WriteState::FallbackRecreated);
    assert_eq!(report.transitions, vec![WriteState::FallbackRecreated]);
    assert!(report.bundle_path.join(CONTENT_FILE).is_file());
    assert!(report.bundle_path.join(META_FILE).is_file());
    assert!(report.bundle_path.join(ASSETS_DIR).join("music.mp3").is_file());
}

#[test]
fn test_existing_bundle_replace_policy() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("X")).unwrap();
    std::fs::write(root.path().join("X").join("stale.txt"), b"old").unwrap();

    let err = ProjectWriter::json()
        .allow_replace(false)
        .write(&project, root.path(), "X")
        .unwrap_err();
    assert!(matches!(err, BundleError::AlreadyExists(_)));

    let report = ProjectWriter::json().write(&project, root.path(), "X").unwrap();
    assert_eq!(report.state, WriteState::Written);
    assert!(!report.bundle_path.join("stale.txt").exists());
}

#[test]
fn test_author_failure_is_fatal() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let err = ProjectWriter::new(Arc::new(FailingAuthor))
        .write(&project, root.path(), "X")
        .unwrap_err();
    assert!(matches!(err, BundleError::Author(_)));
}

#[test]
fn test_invalid_bundle_id_writes_nothing() {
    let (_cache, resources) = media_cache();
    let project = project(&resources);
    let root = tempfile::tempdir().unwrap();

    let err = ProjectWriter::json().write(&project, root.path(), "../escape").unwrap_err();
    assert!(matches!(err, BundleError::InvalidBundleId(_)));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}
