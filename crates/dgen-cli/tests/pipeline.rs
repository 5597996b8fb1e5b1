//! End-to-end conversions with in-process media collaborators.

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use url::Url;

use dgen_bundle::{
    scan, DraftContent, ProjectWriter, RootMetaInfo, StorageConfig, WriteState, ASSETS_DIR, CONTENT_FILE,
    ROOT_META_FILE, TRANSFER_ASSETS_DIR,
};
use dgen_cli::{ConversionPipeline, PipelineError};
use dgen_media::{
    file_name_for, DownloadedFile, Downloader, MediaError, MediaProbe, MediaResolver, MediaResult, ProbeInfo,
    ResolverConfig,
};
use dgen_models::{MediaKind, ValidationReason};

/// Serves a small body for every URL except ones containing `missing`.
#[derive(Default)]
struct FakeDownloader {
    calls: AtomicUsize,
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &Url, dest_dir: &Path) -> MediaResult<DownloadedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.path().contains("missing") {
            return Err(MediaError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        }
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(file_name_for(url, None));
        tokio::fs::write(&path, vec![7u8; 1000]).await?;
        Ok(DownloadedFile {
            path,
            size_bytes: 1000,
            content_type: None,
        })
    }
}

/// 5s videos and 60s audio, by extension.
struct FakeProbe;

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeInfo> {
        let audio = path.extension().is_some_and(|e| e == "mp3");
        Ok(ProbeInfo {
            duration_ms: if audio { 60_000 } else { 5000 },
            format: "fake".to_string(),
            kind: if audio { MediaKind::Audio } else { MediaKind::Video },
        })
    }
}

struct Harness {
    _data: TempDir,
    out: TempDir,
    downloader: Arc<FakeDownloader>,
    pipeline: ConversionPipeline,
}

fn harness_with(storage: impl FnOnce(&Path) -> StorageConfig) -> Harness {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    let resolver = MediaResolver::new(
        ResolverConfig {
            max_concurrent: 2,
            download_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            retries: 0,
        },
        downloader.clone(),
        Arc::new(FakeProbe),
    );
    let pipeline = ConversionPipeline::new(storage(data.path()), resolver, ProjectWriter::json());
    Harness {
        _data: data,
        out,
        downloader,
        pipeline,
    }
}

fn harness() -> Harness {
    let h = harness_with(|data: &Path| StorageConfig::local(data));
    let root = h.out.path().to_path_buf();
    Harness {
        pipeline: h.pipeline.with_output_root(root),
        ..h
    }
}

/// Name the fake downloader stores `url` under.
fn local_name(url: &str) -> String {
    file_name_for(&Url::parse(url).unwrap(), None)
}

fn example_document() -> String {
    json!({
        "width": 1920,
        "height": 1080,
        "fps": 30,
        "tracks": [{
            "track_type": "video",
            "segments": [{
                "kind": "video",
                "material_url": "https://x/a.mp4",
                "time_range": {"start": 0, "end": 5000}
            }]
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_example_conversion_round_trips_through_scan() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);

    let outcome = h
        .pipeline
        .convert_with_id(&example_document(), Some("example"), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.bundle_id, "example");
    assert_eq!(outcome.duration_ms, 5000);
    assert_eq!(outcome.state, WriteState::Written);
    assert_eq!(outcome.bundle_path, h.out.path().join("example"));
    assert!(outcome.resolve_errors.is_empty());

    let index = scan(h.out.path()).unwrap();
    assert_eq!(index.count, 1);
    assert_eq!(index.bundles[0].duration_ms, 5000);
}

#[tokio::test]
async fn test_second_conversion_reuses_cached_media() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);

    let first = h.pipeline.convert(&example_document(), &cancel).await.unwrap();
    let second = h.pipeline.convert(&example_document(), &cancel).await.unwrap();

    assert_ne!(first.bundle_id, second.bundle_id);
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.resolver().cache_len().await, 1);
    assert!(second.bundle_path.join("Assets").join(local_name("https://x/a.mp4")).is_file());
}

#[tokio::test]
async fn test_referenced_404_fails_naming_the_segment() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);
    let doc = json!({
        "project": {"width": 1280, "height": 720},
        "tracks": [{
            "track_type": "video",
            "segments": [
                {"kind": "video", "material_url": "https://x/a.mp4", "time_range": {"start": 0, "end": 1000}},
                {"kind": "video", "material_url": "https://x/missing.mp4", "time_range": {"start": 1000, "end": 2000}}
            ]
        }]
    })
    .to_string();

    let err = h.pipeline.convert(&doc, &cancel).await.unwrap_err();
    match &err {
        PipelineError::UnresolvedMedia { cause, .. } => assert_eq!(cause.http_status(), Some(404)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.location().as_deref(), Some("tracks[0].segments[1]"));
    assert_eq!(scan(h.out.path()).unwrap().count, 0);
}

#[tokio::test]
async fn test_invalid_document_downloads_nothing() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);
    let doc = json!({
        "width": 1920,
        "height": 1080,
        "tracks": [{
            "track_type": "video",
            "segments": [
                {"kind": "video", "material_url": "https://x/a.mp4", "time_range": {"start": 0, "end": 1000}},
                {"kind": "video", "material_url": "https://x/a.mp4", "time_range": {"start": 5000, "end": 3000}}
            ]
        }]
    })
    .to_string();

    let err = h.pipeline.convert(&doc, &cancel).await.unwrap_err();
    match err {
        PipelineError::Validation(e) => {
            assert_eq!(e.reason, ValidationReason::InvalidTimeRange);
            assert_eq!(e.path, "tracks[0].segments[1]");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_document_converts_drafts_independently() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);
    let doc = json!({
        "drafts": [
            {
                "draft_id": "first",
                "project": {"name": "One", "width": 1080, "height": 1920},
                "tracks": [{"track_type": "text", "segments": [
                    {"kind": "text", "content": "Hi", "time_range": {"start": 0, "end": 3000}}
                ]}]
            },
            {
                "project": {"width": 1080},
                "tracks": [{"track_type": "text", "segments": []}]
            },
            {
                "draft_id": "third",
                "project": {"width": 1080, "height": 1920},
                "tracks": [{"track_type": "audio", "segments": [
                    {"kind": "audio", "material_url": "https://x/music.mp3", "time_range": {"start": 0, "end": 8000}}
                ]}]
            }
        ]
    })
    .to_string();

    let outcomes = h.pipeline.convert_document(&doc, &cancel).await.unwrap();
    assert_eq!(outcomes.len(), 3);

    let first = outcomes[0].as_ref().unwrap();
    assert_eq!(first.bundle_id, "first");
    assert_eq!(first.duration_ms, 3000);

    match &outcomes[1] {
        Err(PipelineError::Validation(e)) => {
            assert_eq!(e.reason, ValidationReason::MissingField);
            assert!(e.path.starts_with("drafts[1]"), "{}", e.path);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(outcomes[2].as_ref().unwrap().duration_ms, 8000);

    let refresh = h.pipeline.refresh_index(None).await.unwrap();
    assert_eq!(refresh.index.count, 2);
    assert_eq!(refresh.index_path, h.out.path().join(ROOT_META_FILE));
    let info: RootMetaInfo = serde_json::from_slice(&std::fs::read(&refresh.index_path).unwrap()).unwrap();
    assert_eq!(info.draft_ids, 2);
    let names: Vec<_> = info.all_draft_store.iter().map(|s| s.draft_name.as_str()).collect();
    assert_eq!(names, ["first", "third"]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = harness();
    let (_tx, cancel) = watch::channel(true);

    let err = h.pipeline.convert(&example_document(), &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(h.pipeline.resolver().cache_len().await, 0);
    assert_eq!(scan(h.out.path()).unwrap().count, 0);
}

#[tokio::test]
async fn test_transfer_mode_places_bundle_and_assets() {
    let transfer = tempfile::tempdir().unwrap();
    let folder = transfer.path().to_path_buf();
    let h = harness_with(move |data| StorageConfig::local(data).with_transfer(folder));
    let (_tx, cancel) = watch::channel(false);

    let outcome = h
        .pipeline
        .convert_with_id(&example_document(), Some("moved"), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.bundle_path, transfer.path().join("moved"));
    let name = local_name("https://x/a.mp4");
    assert!(transfer
        .path()
        .join(TRANSFER_ASSETS_DIR)
        .join("moved")
        .join(&name)
        .is_file());
    // Shared assets are referenced in place, never duplicated into the bundle
    assert!(!outcome.bundle_path.join(ASSETS_DIR).exists());
    let content: DraftContent =
        serde_json::from_slice(&std::fs::read(outcome.bundle_path.join(CONTENT_FILE)).unwrap()).unwrap();
    assert_eq!(content.materials.videos[0].path, format!("../{TRANSFER_ASSETS_DIR}/moved/{name}"));

    let index = scan(transfer.path()).unwrap();
    assert_eq!(index.count, 1);
    assert_eq!(index.bundles[0].assets_size_bytes, 1000);
}

#[tokio::test]
async fn test_invalid_bundle_id_is_rejected() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);

    let err = h
        .pipeline
        .convert_with_id(&example_document(), Some("a/b"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "persistence");
    assert_eq!(h.downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_explicit_bundle_id_rejects_batch_document() {
    let h = harness();
    let (_tx, cancel) = watch::channel(false);
    let doc = json!({
        "drafts": [{
            "project": {"width": 1080, "height": 1920},
            "tracks": [{"track_type": "text", "segments": []}]
        }]
    })
    .to_string();

    let err = h
        .pipeline
        .convert_with_id(&doc, Some("one"), &cancel)
        .await
        .unwrap_err();
    match err {
        PipelineError::Validation(e) => {
            assert_eq!(e.reason, ValidationReason::TypeMismatch);
            assert_eq!(e.path, "drafts");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(scan(h.out.path()).unwrap().count, 0);
}
