//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use dgen_bundle::StorageConfig;
use dgen_media::ResolverConfig;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Process-local root for bundles and downloaded media
    pub data_root: PathBuf,
    /// Write bundles straight into `transfer_folder`
    pub transfer_enabled: bool,
    pub transfer_folder: Option<PathBuf>,
    /// Maximum concurrent downloads
    pub max_downloads: usize,
    /// Timeout of a single HTTP request
    pub download_timeout: Duration,
    /// Retries after a transient download failure
    pub download_retries: u32,
    /// Timeout of a single ffprobe run
    pub probe_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            transfer_enabled: false,
            transfer_folder: None,
            max_downloads: 4,
            download_timeout: Duration::from_secs(30),
            download_retries: 2,
            probe_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_root: std::env::var("DGEN_DATA_ROOT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            transfer_enabled: std::env::var("DGEN_TRANSFER_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            transfer_folder: std::env::var("DGEN_TRANSFER_FOLDER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            max_downloads: std::env::var("DGEN_MAX_DOWNLOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_downloads),
            download_timeout: Duration::from_secs(
                std::env::var("DGEN_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            download_retries: std::env::var("DGEN_DOWNLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.download_retries),
            probe_timeout: Duration::from_secs(
                std::env::var("DGEN_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            data_root: self.data_root.clone(),
            transfer_enabled: self.transfer_enabled,
            transfer_folder: self.transfer_folder.clone(),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_concurrent: self.max_downloads,
            download_timeout: self.download_timeout,
            probe_timeout: self.probe_timeout,
            retries: self.download_retries,
        }
    }
}

/// `<local data dir>/dgen_data`, or the temp dir when the platform has none.
pub fn default_data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dgen_data")
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
