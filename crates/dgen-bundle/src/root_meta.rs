//! Root index (`root_meta_info.json`) listing every bundle under a root.
//!
//! Built from a [`BundleIndex`]; the editor reads this file to populate its
//! draft list, so field names follow its format.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::content::{ms_to_us, new_id, slash_path, write_json_atomic, CONTENT_FILE};
use crate::error::BundleResult;
use crate::scanner::{BundleEntry, BundleIndex};

/// File name of the root index.
pub const ROOT_META_FILE: &str = "root_meta_info.json";

/// One bundle in the root index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftStore {
    pub cloud_draft_cover: bool,
    pub cloud_draft_sync: bool,
    pub draft_cover: String,
    pub draft_fold_path: String,
    /// Uppercase UUID
    pub draft_id: String,
    pub draft_is_invisible: bool,
    pub draft_json_file: String,
    pub draft_name: String,
    pub draft_root_path: String,
    pub draft_timeline_materials_size: u64,
    pub streaming_edit_draft_ready: bool,
    /// Microseconds since the epoch
    pub tm_draft_create: i64,
    /// Microseconds since the epoch
    pub tm_draft_modified: i64,
    pub tm_draft_removed: i64,
    /// Microseconds
    pub tm_duration: u64,
}

impl DraftStore {
    fn from_entry(entry: &BundleEntry, root: &Path, now_us: i64) -> Self {
        let modified_us = entry.modified.map(|m| m.timestamp_micros()).unwrap_or(now_us);
        Self {
            cloud_draft_cover: false,
            cloud_draft_sync: false,
            draft_cover: entry.cover.as_deref().map(slash_path).unwrap_or_default(),
            draft_fold_path: slash_path(&entry.path),
            draft_id: new_id(),
            draft_is_invisible: false,
            draft_json_file: slash_path(&entry.path.join(CONTENT_FILE)),
            draft_name: entry.name.clone(),
            draft_root_path: slash_path(root),
            draft_timeline_materials_size: entry.assets_size_bytes,
            streaming_edit_draft_ready: true,
            tm_draft_create: modified_us,
            tm_draft_modified: modified_us,
            tm_draft_removed: 0,
            tm_duration: ms_to_us(entry.duration_ms),
        }
    }
}

/// The root index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootMetaInfo {
    pub all_draft_store: Vec<DraftStore>,
    /// Number of bundles
    pub draft_ids: usize,
    pub root_path: String,
}

impl RootMetaInfo {
    pub fn from_index(index: &BundleIndex) -> Self {
        let now_us = Utc::now().timestamp_micros();
        let all_draft_store: Vec<_> = index
            .bundles
            .iter()
            .map(|entry| DraftStore::from_entry(entry, &index.root, now_us))
            .collect();
        Self {
            draft_ids: all_draft_store.len(),
            all_draft_store,
            root_path: slash_path(&index.root),
        }
    }
}

/// Write `info` to `<root>/root_meta_info.json`, replacing any previous one.
pub fn write_root_meta(root: &Path, info: &RootMetaInfo) -> BundleResult<PathBuf> {
    let path = root.join(ROOT_META_FILE);
    write_json_atomic(&path, info)?;
    info!(path = %path.display(), drafts = info.draft_ids, "Root index written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    #[test]
    fn test_index_from_scan() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("b1");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join(CONTENT_FILE),
            br#"{"tracks":[{"segments":[{"target_timerange":{"start":0,"duration":2500000}}]}]}"#,
        )
        .unwrap();
        std::fs::write(dir.join(crate::content::META_FILE), b"{}").unwrap();

        let info = RootMetaInfo::from_index(&scan(root.path()).unwrap());
        assert_eq!(info.draft_ids, 1);
        let store = &info.all_draft_store[0];
        assert_eq!(store.draft_name, "b1");
        assert_eq!(store.tm_duration, 2_500_000);
        assert_eq!(store.draft_id, store.draft_id.to_uppercase());
        assert!(store.draft_json_file.ends_with("b1/draft_content.json"));

        let path = write_root_meta(root.path(), &info).unwrap();
        let read: RootMetaInfo = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(read, info);

        // The index file itself is not a bundle.
        assert_eq!(scan(root.path()).unwrap().count, 1);
    }
}
