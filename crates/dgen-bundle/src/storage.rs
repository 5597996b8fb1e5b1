//! Storage policy: where bundles and their assets live.
//!
//! In transfer mode bundles go straight into a user-chosen folder (usually
//! the editor's own draft directory) and downloaded assets into a shared
//! `DraftAssets/<bundle_id>` folder beside them. Otherwise everything stays
//! under the process-local data root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BundleResult, IoContext};

/// Shared asset folder inside a transfer root.
pub const TRANSFER_ASSETS_DIR: &str = "DraftAssets";

/// Storage configuration, passed in explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Process-local root for bundles and cached assets
    pub data_root: PathBuf,
    pub transfer_enabled: bool,
    pub transfer_folder: Option<PathBuf>,
}

impl StorageConfig {
    pub fn local(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            transfer_enabled: false,
            transfer_folder: None,
        }
    }

    pub fn with_transfer(mut self, folder: impl Into<PathBuf>) -> Self {
        self.transfer_enabled = true;
        self.transfer_folder = Some(folder.into());
        self
    }

    /// Transfer folder, when transfer mode is on and the folder exists.
    pub fn active_transfer_folder(&self) -> Option<&Path> {
        if !self.transfer_enabled {
            return None;
        }
        self.transfer_folder.as_deref().filter(|f| f.is_dir())
    }
}

/// Root directory that bundles are written into. Created if missing.
pub fn effective_output_root(config: &StorageConfig) -> BundleResult<PathBuf> {
    let root = match config.active_transfer_folder() {
        Some(folder) => folder.to_path_buf(),
        None => config.data_root.join("drafts"),
    };
    std::fs::create_dir_all(&root).at(&root)?;
    debug!(root = %root.display(), "Resolved output root");
    Ok(root)
}

/// Directory that media for `bundle_id` is downloaded into. Created if
/// missing.
pub fn effective_asset_root(config: &StorageConfig, bundle_id: &str) -> BundleResult<PathBuf> {
    let root = match config.active_transfer_folder() {
        Some(folder) => folder.join(TRANSFER_ASSETS_DIR).join(bundle_id),
        None => config.data_root.join("assets").join(bundle_id),
    };
    std::fs::create_dir_all(&root).at(&root)?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::local(dir.path());

        let out = effective_output_root(&config).unwrap();
        assert_eq!(out, dir.path().join("drafts"));
        assert!(out.is_dir());

        let assets = effective_asset_root(&config, "b1").unwrap();
        assert_eq!(assets, dir.path().join("assets").join("b1"));
        assert!(assets.is_dir());
    }

    #[test]
    fn test_transfer_mode() {
        let data = tempfile::tempdir().unwrap();
        let transfer = tempfile::tempdir().unwrap();
        let config = StorageConfig::local(data.path()).with_transfer(transfer.path());

        assert_eq!(effective_output_root(&config).unwrap(), transfer.path());
        assert_eq!(
            effective_asset_root(&config, "b1").unwrap(),
            transfer.path().join(TRANSFER_ASSETS_DIR).join("b1")
        );
    }

    #[test]
    fn test_missing_transfer_folder_falls_back() {
        let data = tempfile::tempdir().unwrap();
        let config = StorageConfig::local(data.path()).with_transfer(data.path().join("nope"));

        assert_eq!(effective_output_root(&config).unwrap(), data.path().join("drafts"));
        assert!(!data.path().join("nope").exists());
    }

    #[test]
    fn test_disabled_transfer_ignores_folder() {
        let data = tempfile::tempdir().unwrap();
        let transfer = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::local(data.path()).with_transfer(transfer.path());
        config.transfer_enabled = false;

        assert_eq!(effective_output_root(&config).unwrap(), data.path().join("drafts"));
    }
}
