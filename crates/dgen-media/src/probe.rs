//! FFprobe media information.

use async_trait::async_trait;
use dgen_models::MediaKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// What a probe learned about a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub duration_ms: u64,
    /// Container format name, e.g. `mov,mp4,m4a,3gp,3g2,mj2`
    pub format: String,
    pub kind: MediaKind,
}

/// Determines duration and format of a local media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeInfo>;
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    duration: Option<String>,
}

/// [`MediaProbe`] that shells out to `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    /// Locate `ffprobe` on `PATH`.
    pub fn from_path() -> MediaResult<Self> {
        let binary = which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(Self { binary })
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ffprobe_failed(
                "FFprobe failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        let info = interpret(probe)?;
        debug!(
            path = %path.display(),
            duration_ms = info.duration_ms,
            format = %info.format,
            kind = %info.kind,
            "Probed media"
        );
        Ok(info)
    }
}

fn interpret(probe: FfprobeOutput) -> MediaResult<ProbeInfo> {
    let has = |codec_type: &str| probe.streams.iter().any(|s| s.codec_type == codec_type);
    let kind = if has("video") {
        MediaKind::Video
    } else if has("audio") {
        MediaKind::Audio
    } else {
        return Err(MediaError::UnsupportedMedia(
            "no audio or video stream".to_string(),
        ));
    };

    // Some containers only report duration per stream.
    let seconds = probe
        .format
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
                .reduce(f64::max)
        })
        .ok_or_else(|| MediaError::ffprobe_failed("duration not reported", None))?;

    Ok(ProbeInfo {
        duration_ms: (seconds * 1000.0).round() as u64,
        format: probe.format.format_name.unwrap_or_default(),
        kind,
    })
}

/// Parse an ffprobe duration string; zero and negative values are unusable.
fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}
