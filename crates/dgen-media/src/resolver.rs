//! URL to local media resolution with a shared cache.
//!
//! Each distinct URL is looked up in the cache, otherwise downloaded and
//! probed. Transfers run concurrently under a semaphore; one URL's failure
//! never affects the others. Only fully downloaded and probed resources are
//! inserted, so a cancelled or timed out transfer leaves the cache as it was.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, info, warn};

use dgen_models::{MediaKind, MediaResource};

use crate::download::{parse_media_url, Downloader, HttpDownloader};
use crate::error::{MediaResult, ResolveCause, ResolveError};
use crate::probe::{FfprobeProbe, MediaProbe, ProbeInfo};
use crate::sniff;

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum concurrent transfers
    pub max_concurrent: usize,
    /// Timeout of a single HTTP request
    pub download_timeout: Duration,
    /// Timeout of a single probe
    pub probe_timeout: Duration,
    /// Retries after a transient download failure
    pub retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            download_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(30),
            retries: 2,
        }
    }
}

impl ResolverConfig {
    /// Deadline for the whole download stage of one URL, retries included.
    fn download_deadline(&self) -> Duration {
        let attempts = self.retries.saturating_add(1);
        self.download_timeout
            .saturating_mul(attempts)
            .saturating_add(Duration::from_secs(8).saturating_mul(self.retries))
    }
}

/// Outcome of one [`MediaResolver::resolve`] call.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Successfully resolved resources keyed by URL
    pub resources: HashMap<String, MediaResource>,
    /// One entry per URL that failed
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves remote media URLs to local files with known duration.
pub struct MediaResolver {
    config: ResolverConfig,
    downloader: Arc<dyn Downloader>,
    probe: Arc<dyn MediaProbe>,
    cache: Arc<Mutex<HashMap<String, MediaResource>>>,
}

impl MediaResolver {
    pub fn new(config: ResolverConfig, downloader: Arc<dyn Downloader>, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            config,
            downloader,
            probe,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolver using HTTP downloads and `ffprobe` from `PATH`.
    pub fn with_defaults(config: ResolverConfig) -> MediaResult<Self> {
        let downloader = HttpDownloader::new(config.download_timeout, config.retries)?;
        let probe = FfprobeProbe::from_path()?;
        Ok(Self::new(config, Arc::new(downloader), Arc::new(probe)))
    }

    /// Cached resource for `url`, if any.
    pub async fn cached(&self, url: &str) -> Option<MediaResource> {
        self.cache.lock().await.get(url).cloned()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Resolve every distinct URL in `urls`, downloading into `dest_dir`.
    ///
    /// Never fails as a whole: per-URL failures are collected in
    /// [`Resolution::errors`]. Flipping `cancel` to `true` aborts transfers
    /// still in flight; they are reported as [`ResolveCause::Cancelled`].
    pub async fn resolve(
        &self,
        urls: &[String],
        dest_dir: &Path,
        cancel: &watch::Receiver<bool>,
    ) -> Resolution {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = urls
            .iter()
            .map(String::as_str)
            .filter(|url| seen.insert(*url))
            .collect();

        let semaphore = Semaphore::new(self.config.max_concurrent.max(1));
        let semaphore = &semaphore;

        let tasks = distinct.iter().map(|url| {
            let cancel = cancel.clone();
            async move {
                let outcome = self.resolve_one(url, dest_dir, semaphore, cancel).await;
                (*url, outcome)
            }
        });
        let outcomes = join_all(tasks).await;

        let mut resolution = Resolution::default();
        for (url, outcome) in outcomes {
            match outcome {
                Ok(resource) => {
                    resolution.resources.insert(url.to_string(), resource);
                }
                Err(cause) => {
                    warn!(url = %url, cause = %cause, "Media resolution failed");
                    metrics::counter!("dgen_media_resolve_failures_total", "cause" => cause.as_str())
                        .increment(1);
                    resolution.errors.push(ResolveError::new(url, cause));
                }
            }
        }

        info!(
            requested = distinct.len(),
            resolved = resolution.resources.len(),
            failed = resolution.errors.len(),
            "Media resolution finished"
        );
        resolution
    }

    async fn resolve_one(
        &self,
        url: &str,
        dest_dir: &Path,
        semaphore: &Semaphore,
        cancel: watch::Receiver<bool>,
    ) -> Result<MediaResource, ResolveCause> {
        if let Some(hit) = self.cache_hit(url).await {
            debug!(url = %url, "Media cache hit");
            metrics::counter!("dgen_media_cache_hits_total").increment(1);
            return Ok(hit);
        }

        let parsed = parse_media_url(url).map_err(ResolveCause::from_download)?;

        let work = async {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| ResolveCause::Cancelled)?;

            let deadline = self.config.download_deadline();
            let file = tokio::time::timeout(deadline, self.downloader.download(&parsed, dest_dir))
                .await
                .map_err(|_| ResolveCause::Timeout {
                    seconds: deadline.as_secs(),
                })?
                .map_err(ResolveCause::from_download)?;

            let info = match self.probe_file(&file.path).await {
                Ok(info) => info,
                Err(cause) => {
                    if let Err(e) = tokio::fs::remove_file(&file.path).await {
                        debug!(path = %file.path.display(), error = %e, "Could not remove unprobeable file");
                    }
                    return Err(cause);
                }
            };

            Ok::<_, ResolveCause>(MediaResource {
                url: url.to_string(),
                local_path: file.path,
                duration_ms: info.duration_ms,
                format: info.format,
                kind: info.kind,
                size_bytes: file.size_bytes,
                resolved_at: Utc::now(),
            })
        };

        let resource = tokio::select! {
            biased;
            _ = cancelled(cancel) => return Err(ResolveCause::Cancelled),
            result = work => result?,
        };

        self.cache
            .lock()
            .await
            .insert(url.to_string(), resource.clone());
        Ok(resource)
    }

    /// Cache lookup that evicts entries whose local file has disappeared.
    async fn cache_hit(&self, url: &str) -> Option<MediaResource> {
        let mut cache = self.cache.lock().await;
        match cache.get(url) {
            Some(hit) if hit.local_path.exists() => Some(hit.clone()),
            Some(_) => {
                debug!(url = %url, "Cached media file is gone, evicting");
                cache.remove(url);
                None
            }
            None => None,
        }
    }

    /// Still images have no duration and skip the probe.
    async fn probe_file(&self, path: &Path) -> Result<ProbeInfo, ResolveCause> {
        if sniff::kind_for_path(path) == Some(MediaKind::Image) {
            return Ok(ProbeInfo {
                duration_ms: 0,
                format: "image".to_string(),
                kind: MediaKind::Image,
            });
        }

        let timeout = self.config.probe_timeout;
        tokio::time::timeout(timeout, self.probe.probe(path))
            .await
            .map_err(|_| ResolveCause::Timeout {
                seconds: timeout.as_secs(),
            })?
            .map_err(ResolveCause::from_probe)
    }
}

/// Completes once `cancel` holds `true`; never completes if the sender is
/// dropped while it is still `false`.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_covers_retries() {
        let config = ResolverConfig {
            download_timeout: Duration::from_secs(10),
            retries: 2,
            ..Default::default()
        };
        assert_eq!(config.download_deadline(), Duration::from_secs(46));
    }

    #[tokio::test]
    async fn test_cancelled_returns_when_flag_set() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(cancelled(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_pends_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let result = tokio::time::timeout(Duration::from_millis(50), cancelled(rx)).await;
        assert!(result.is_err());
    }
}
