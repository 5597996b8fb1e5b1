//! Bundle scanner.
//!
//! Read-only walk over a directory of bundles. The metadata file is only
//! checked for existence since editors may encrypt it. A content file that
//! cannot be read or parsed degrades that bundle's duration to zero and
//! produces a [`ScanWarning`]; it never fails the scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::content::{dir_size, strip_bom, ASSETS_DIR, CONTENT_FILE, META_FILE};
use crate::error::{BundleError, BundleResult, IoContext};
use crate::storage::TRANSFER_ASSETS_DIR;

const COVER_NAMES: [&str; 3] = ["draft_cover", "cover", "thumbnail"];
const COVER_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// One bundle found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Directory name
    pub name: String,
    pub path: PathBuf,
    /// Max segment end, 0 when the content file is unreadable
    pub duration_ms: u64,
    pub assets_size_bytes: u64,
    pub cover: Option<PathBuf>,
    pub modified: Option<DateTime<Utc>>,
}

/// Non-fatal problem with one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub bundle: String,
    pub message: String,
}

/// Result of scanning a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleIndex {
    pub root: PathBuf,
    pub bundles: Vec<BundleEntry>,
    pub count: usize,
    pub warnings: Vec<ScanWarning>,
}

impl BundleIndex {
    pub fn get(&self, name: &str) -> Option<&BundleEntry> {
        self.bundles.iter().find(|b| b.name == name)
    }
}

/// Scan the immediate subdirectories of `root` for bundles.
///
/// A subdirectory is a bundle when it holds both the content and the
/// metadata file. Results are sorted by name.
pub fn scan(root: &Path) -> BundleResult<BundleIndex> {
    if !root.is_dir() {
        return Err(BundleError::RootNotFound(root.to_path_buf()));
    }

    let mut bundles = Vec::new();
    let mut warnings = Vec::new();

    for entry in std::fs::read_dir(root).at(root)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == TRANSFER_ASSETS_DIR {
            continue;
        }
        if !path.join(CONTENT_FILE).is_file() || !path.join(META_FILE).is_file() {
            continue;
        }

        let duration_ms = match read_duration_ms(&path.join(CONTENT_FILE)) {
            Ok(ms) => ms,
            Err(message) => {
                warn!(bundle = %name, error = %message, "Unreadable content file");
                warnings.push(ScanWarning {
                    bundle: name.clone(),
                    message,
                });
                0
            }
        };

        let assets_size_bytes =
            dir_size(&path.join(ASSETS_DIR)) + dir_size(&root.join(TRANSFER_ASSETS_DIR).join(&name));

        bundles.push(BundleEntry {
            cover: find_cover(&path),
            modified: modified_at(&path),
            name,
            path,
            duration_ms,
            assets_size_bytes,
        });
    }

    bundles.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(root = %root.display(), count = bundles.len(), warnings = warnings.len(), "Scan complete");

    Ok(BundleIndex {
        root: root.to_path_buf(),
        count: bundles.len(),
        bundles,
        warnings,
    })
}

/// Max segment end in milliseconds. Empty files are zero.
fn read_duration_ms(path: &Path) -> Result<u64, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let bytes = strip_bom(&bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(0);
    }
    let value: Value = serde_json::from_slice(bytes).map_err(|e| format!("invalid content JSON: {e}"))?;
    Ok(content_duration_ms(&value))
}

/// Walk `tracks[].segments[]`, understanding both the microsecond
/// `target_timerange{start,duration}` and the millisecond `time_range.end`
/// forms.
pub fn content_duration_ms(content: &Value) -> u64 {
    let Some(tracks) = content.get("tracks").and_then(Value::as_array) else {
        return 0;
    };
    tracks
        .iter()
        .filter_map(|t| t.get("segments").and_then(Value::as_array))
        .flatten()
        .map(segment_end_ms)
        .max()
        .unwrap_or(0)
}

fn segment_end_ms(segment: &Value) -> u64 {
    if let Some(range) = segment.get("target_timerange") {
        let start = range.get("start").and_then(Value::as_u64).unwrap_or(0);
        let duration = range.get("duration").and_then(Value::as_u64).unwrap_or(0);
        return start.saturating_add(duration) / 1000;
    }
    segment
        .get("time_range")
        .and_then(|r| r.get("end"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn find_cover(bundle: &Path) -> Option<PathBuf> {
    COVER_NAMES
        .iter()
        .flat_map(|name| COVER_EXTENSIONS.iter().map(move |ext| bundle.join(format!("{name}.{ext}"))))
        .find(|p| p.is_file())
}

fn modified_at(bundle: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(bundle.join(CONTENT_FILE)).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(root: &Path, name: &str, content: &[u8]) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONTENT_FILE), content).unwrap();
        std::fs::write(dir.join(META_FILE), b"opaque").unwrap();
        dir
    }

    #[test]
    fn test_content_duration_forms() {
        let content = json!({
            "tracks": [
                {"segments": [{"target_timerange": {"start": 1_000_000, "duration": 4_000_000}}]},
                {"segments": [{"time_range": {"start": 0, "end": 7500}}]}
            ]
        });
        assert_eq!(content_duration_ms(&content), 7500);
        assert_eq!(content_duration_ms(&json!({})), 0);
    }

    #[test]
    fn test_scan_tolerates_bad_bundles() {
        let root = tempfile::tempdir().unwrap();
        bundle(
            root.path(),
            "good",
            br#"{"tracks":[{"segments":[{"target_timerange":{"start":0,"duration":5000000}}]}]}"#,
        );
        bundle(root.path(), "corrupt", b"\x00\x13garbage");
        bundle(root.path(), "empty", b"");
        bundle(root.path(), "bom", b"\xEF\xBB\xBF{\"tracks\":[]}");

        // Not bundles
        std::fs::create_dir(root.path().join("no_meta")).unwrap();
        std::fs::write(root.path().join("no_meta").join(CONTENT_FILE), b"{}").unwrap();
        std::fs::write(root.path().join("stray.txt"), b"x").unwrap();

        let index = scan(root.path()).unwrap();
        assert_eq!(index.count, 4);
        let names: Vec<_> = index.bundles.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["bom", "corrupt", "empty", "good"]);

        assert_eq!(index.get("good").unwrap().duration_ms, 5000);
        assert_eq!(index.get("corrupt").unwrap().duration_ms, 0);
        assert_eq!(index.get("empty").unwrap().duration_ms, 0);
        assert_eq!(index.warnings.len(), 1);
        assert_eq!(index.warnings[0].bundle, "corrupt");
    }

    #[test]
    fn test_scan_assets_and_cover() {
        let root = tempfile::tempdir().unwrap();
        let dir = bundle(root.path(), "b", b"{}");
        std::fs::create_dir(dir.join(ASSETS_DIR)).unwrap();
        std::fs::write(dir.join(ASSETS_DIR).join("a.mp4"), [0u8; 100]).unwrap();
        let shared = root.path().join(TRANSFER_ASSETS_DIR).join("b");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("c.mp3"), [0u8; 20]).unwrap();
        std::fs::write(dir.join("cover.png"), b"png").unwrap();

        let index = scan(root.path()).unwrap();
        let entry = index.get("b").unwrap();
        assert_eq!(entry.assets_size_bytes, 120);
        assert_eq!(entry.cover.as_deref(), Some(dir.join("cover.png").as_path()));
        assert!(entry.modified.is_some());
    }

    #[test]
    fn test_scan_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan(&root.path().join("missing")),
            Err(BundleError::RootNotFound(_))
        ));
    }
}
