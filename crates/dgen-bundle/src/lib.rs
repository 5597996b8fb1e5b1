//! On-disk draft bundles.
//!
//! This crate provides:
//! - Storage policy (where bundles and assets go)
//! - The [`ProjectWriter`] and its rename reconciliation
//! - A pluggable [`DraftAuthor`] backend with a built-in JSON author
//! - The bundle [`scan`]ner and the root index it feeds
//!
//! Everything here is blocking filesystem work; async callers should run it
//! on a blocking thread.

pub mod assets;
pub mod author;
pub mod content;
pub mod error;
pub mod root_meta;
pub mod scanner;
pub mod storage;
pub mod writer;

pub use author::{DraftAuthor, DraftSession, JsonDraftAuthor};
pub use content::{
    ms_to_us, ContentMaterial, DraftContent, DraftHeader, DraftMeta, ASSETS_DIR, CONTENT_FILE, META_FILE,
};
pub use error::{BundleError, BundleResult};
pub use root_meta::{write_root_meta, DraftStore, RootMetaInfo, ROOT_META_FILE};
pub use scanner::{scan, BundleEntry, BundleIndex, ScanWarning};
pub use storage::{effective_asset_root, effective_output_root, StorageConfig, TRANSFER_ASSETS_DIR};
pub use writer::{validate_bundle_id, ProjectWriter, WriteReport, WriteState};
