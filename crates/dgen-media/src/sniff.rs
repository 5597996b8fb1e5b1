//! Content sniffing for downloaded files.
//!
//! Servers routinely lie about content types, and URLs often carry no
//! extension at all. The first bytes of the body settle the real format.

use dgen_models::MediaKind;
use std::path::Path;

/// Format recognised from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    /// Canonical extension including the dot
    pub extension: &'static str,
    pub kind: MediaKind,
}

impl Sniffed {
    const fn new(extension: &'static str, kind: MediaKind) -> Self {
        Self { extension, kind }
    }
}

/// Bytes needed to recognise every supported signature.
pub const SNIFF_LEN: usize = 16;

/// Recognise a media format from the first bytes of a file.
pub fn sniff(head: &[u8]) -> Option<Sniffed> {
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(Sniffed::new(".jpg", MediaKind::Image));
    }
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(Sniffed::new(".png", MediaKind::Image));
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return Some(Sniffed::new(".gif", MediaKind::Image));
    }
    if head.starts_with(b"BM") && head.len() >= 6 {
        return Some(Sniffed::new(".bmp", MediaKind::Image));
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" {
        match &head[8..12] {
            b"WEBP" => return Some(Sniffed::new(".webp", MediaKind::Image)),
            b"WAVE" => return Some(Sniffed::new(".wav", MediaKind::Audio)),
            b"AVI " => return Some(Sniffed::new(".avi", MediaKind::Video)),
            _ => {}
        }
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(match &head[8..12] {
            b"M4A " => Sniffed::new(".m4a", MediaKind::Audio),
            b"qt  " => Sniffed::new(".mov", MediaKind::Video),
            _ => Sniffed::new(".mp4", MediaKind::Video),
        });
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(Sniffed::new(".webm", MediaKind::Video));
    }
    if head.starts_with(b"ID3") || (head.len() >= 2 && head[0] == 0xFF && head[1] & 0xE0 == 0xE0) {
        return Some(Sniffed::new(".mp3", MediaKind::Audio));
    }
    if head.starts_with(b"OggS") {
        return Some(Sniffed::new(".ogg", MediaKind::Audio));
    }
    if head.starts_with(b"fLaC") {
        return Some(Sniffed::new(".flac", MediaKind::Audio));
    }
    None
}

/// Whether a body is an HTML page (an error page served with 200).
pub fn looks_like_html(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start().to_ascii_lowercase();
    trimmed.starts_with("<!doctype") || trimmed.starts_with("<html") || trimmed.starts_with("<head")
}

/// Extension for a `Content-Type` header value. Unknown types map to `.mp4`.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return ".mp4";
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        "video/x-msvideo" => ".avi",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/aac" => ".aac",
        "audio/ogg" => ".ogg",
        "audio/flac" => ".flac",
        "audio/mp4" | "audio/x-m4a" => ".m4a",
        _ => ".mp4",
    }
}

/// Media kind implied by a file extension.
pub fn kind_for_path(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "mov" | "avi" | "mkv" | "flv" | "wmv" | "webm" | "m4v" | "mpg" | "mpeg" => {
            Some(MediaKind::Video)
        }
        "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" | "wma" => Some(MediaKind::Audio),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => Some(MediaKind::Image),
        _ => None,
    }
}
