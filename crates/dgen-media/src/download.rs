//! HTTP media download.
//!
//! Bodies are streamed to a `.part` file next to the destination and moved
//! into place only once complete and sniffed, so a failed or dropped
//! transfer never leaves a file that looks finished.

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::retry::{retry_async, RetryConfig};
use crate::sniff::{self, SNIFF_LEN};

/// Bodies smaller than this are treated as broken downloads.
pub const MIN_FILE_SIZE: u64 = 100;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// Fetches a remote URL into a local directory.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &Url, dest_dir: &Path) -> MediaResult<DownloadedFile>;
}

/// Parse and check a media URL. Only `http` and `https` are accepted.
pub fn parse_media_url(raw: &str) -> MediaResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| MediaError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(MediaError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            raw, scheme
        ))),
    }
}

/// Local file name for a URL.
///
/// Always carries a short hash of the full URL, so different URLs never
/// share a file in one directory. The last path segment supplies the stem
/// and extension when it has an extension; otherwise the name is
/// `material_<hash>` with an extension from the response content type.
pub fn file_name_for(url: &Url, content_type: Option<&str>) -> String {
    let hash = url_hash(url);
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if let Some(name) = sanitize(last) {
        let name = Path::new(&name);
        if let (Some(stem), Some(ext)) = (name.file_stem(), name.extension()) {
            return format!("{}_{}.{}", stem.to_string_lossy(), hash, ext.to_string_lossy());
        }
    }

    format!("material_{}{}", hash, sniff::extension_for_content_type(content_type))
}

/// First 12 hex digits of the URL's SHA-256.
fn url_hash(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

/// Percent-decode a path segment and drop anything unsafe in a file name.
fn sanitize(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut raw = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(b) => {
                raw.push(b);
                i += 3;
            }
            None => {
                raw.push(bytes[i]);
                i += 1;
            }
        }
    }
    let decoded = String::from_utf8_lossy(&raw);
    let cleaned: String = decoded
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Removes the partial file unless the download was committed.
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove partial download");
                }
            }
        }
    }
}

/// [`Downloader`] backed by `reqwest`, with retries on transient failures.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpDownloader {
    /// Create a downloader with a per-request timeout and retry budget.
    pub fn new(timeout: Duration, retries: u32) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, retries))
    }

    pub fn with_client(client: reqwest::Client, retries: u32) -> Self {
        Self {
            client,
            retry: RetryConfig::new("media_download").with_max_retries(retries),
        }
    }

    /// Override the backoff base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.retry = self.retry.with_base_delay(delay);
        self
    }

    async fn download_once(&self, url: &Url, dest_dir: &Path) -> MediaResult<DownloadedFile> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "image/*,video/*,audio/*,*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tokio::fs::create_dir_all(dest_dir).await?;
        let file_name = file_name_for(url, content_type.as_deref());
        let mut part = PartFile::new(dest_dir.join(format!("{}.part", file_name)));

        let mut file = tokio::fs::File::create(&part.path).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut size_bytes = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if size_bytes < MIN_FILE_SIZE {
            return Err(MediaError::download_failed(format!(
                "body too small ({} bytes)",
                size_bytes
            )));
        }
        if sniff::looks_like_html(&head) {
            return Err(MediaError::download_failed("server returned an HTML page"));
        }

        let mut final_path = dest_dir.join(&file_name);
        if let Some(sniffed) = sniff::sniff(&head) {
            let declared = sniff::kind_for_path(&final_path);
            if declared != Some(sniffed.kind) {
                debug!(
                    file = %file_name,
                    extension = sniffed.extension,
                    "Correcting extension from content"
                );
                final_path.set_extension(sniffed.extension.trim_start_matches('.'));
            }
        }

        tokio::fs::rename(&part.path, &final_path).await?;
        part.committed = true;

        Ok(DownloadedFile {
            path: final_path,
            size_bytes,
            content_type,
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &Url, dest_dir: &Path) -> MediaResult<DownloadedFile> {
        let file = retry_async(&self.retry, MediaError::is_retryable, || {
            self.download_once(url, dest_dir)
        })
        .await?;

        info!(
            url = %url,
            path = %file.path.display(),
            size_bytes = file.size_bytes,
            "Media downloaded"
        );
        metrics::counter!("dgen_media_downloads_total").increment(1);
        metrics::counter!("dgen_media_download_bytes_total").increment(file.size_bytes);
        Ok(file)
    }
}
