//! Media resolution for the draft generator.
//!
//! This crate provides:
//! - HTTP download of remote media with retries and format sniffing
//! - Duration/format probing via FFprobe
//! - A URL-keyed cache with bounded concurrent resolution
//!
//! The [`Downloader`] and [`MediaProbe`] traits are the seams tests replace.

pub mod download;
pub mod error;
pub mod probe;
pub mod resolver;
pub mod retry;
pub mod sniff;

pub use download::{file_name_for, parse_media_url, DownloadedFile, Downloader, HttpDownloader};
pub use error::{MediaError, MediaResult, ResolveCause, ResolveError};
pub use probe::{FfprobeProbe, MediaProbe, ProbeInfo};
pub use resolver::{MediaResolver, Resolution, ResolverConfig};
pub use retry::{retry_async, RetryConfig};
