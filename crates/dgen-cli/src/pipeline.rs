//! Conversion pipeline: validate, resolve, assemble, write.

use metrics::counter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use dgen_bundle::{
    effective_asset_root, effective_output_root, scan, validate_bundle_id, write_root_meta, BundleIndex,
    ProjectWriter, RootMetaInfo, StorageConfig, WriteState,
};
use dgen_media::{MediaResolver, ResolveError};
use dgen_models::{assemble, validate, validate_document, AssemblyError, ProjectDescription};

use crate::config::AppConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::ConversionLogger;

/// Result of converting one draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub bundle_id: String,
    /// Final bundle directory; may differ from `<root>/<bundle_id>`
    pub bundle_path: PathBuf,
    pub draft_id: String,
    pub duration_ms: u64,
    pub state: WriteState,
    pub transitions: Vec<WriteState>,
    /// Failures of URLs no segment needed
    pub resolve_errors: Vec<ResolveError>,
}

/// Index refresh result.
#[derive(Debug, Clone, Serialize)]
pub struct IndexRefresh {
    pub index: BundleIndex,
    pub index_path: PathBuf,
}

/// End-to-end converter.
///
/// The resolver cache is shared across conversions run on the same
/// pipeline.
#[derive(Clone)]
pub struct ConversionPipeline {
    storage: StorageConfig,
    output_root: Option<PathBuf>,
    resolver: Arc<MediaResolver>,
    writer: ProjectWriter,
}

impl ConversionPipeline {
    pub fn new(storage: StorageConfig, resolver: MediaResolver, writer: ProjectWriter) -> Self {
        Self {
            storage,
            output_root: None,
            resolver: Arc::new(resolver),
            writer,
        }
    }

    /// Pipeline with HTTP downloads, ffprobe and the JSON author.
    pub fn from_config(config: &AppConfig) -> PipelineResult<Self> {
        let resolver = MediaResolver::with_defaults(config.resolver_config())?;
        Ok(Self::new(config.storage_config(), resolver, ProjectWriter::json()))
    }

    /// Write bundles into `root` instead of the storage policy's root.
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    pub fn resolver(&self) -> &MediaResolver {
        &self.resolver
    }

    /// Output root for new bundles. Created if missing.
    pub fn output_root(&self) -> PipelineResult<PathBuf> {
        match &self.output_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| dgen_bundle::BundleError::io(root, e))?;
                Ok(root.clone())
            }
            None => Ok(effective_output_root(&self.storage)?),
        }
    }

    /// Convert a single-draft document.
    pub async fn convert(&self, raw: &str, cancel: &watch::Receiver<bool>) -> PipelineResult<ConversionOutcome> {
        self.convert_with_id(raw, None, cancel).await
    }

    /// Convert a single-draft document under an explicit bundle ID.
    pub async fn convert_with_id(
        &self,
        raw: &str,
        bundle_id: Option<&str>,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<ConversionOutcome> {
        let description = match validate(raw) {
            Ok(d) => d,
            Err(e) => {
                counter!("dgen_conversions_total", "outcome" => "invalid").increment(1);
                return Err(e.into());
            }
        };
        self.convert_project(description, bundle_id.map(str::to_string), cancel)
            .await
    }

    /// Convert every draft of a batch (or single-draft) document.
    ///
    /// Fails as a whole only when the document itself is unusable; each
    /// draft then succeeds or fails on its own.
    pub async fn convert_document(
        &self,
        raw: &str,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<Vec<PipelineResult<ConversionOutcome>>> {
        let drafts = validate_document(raw)?;
        let mut outcomes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let outcome = match draft {
                Ok(description) => self.convert_project(description, None, cancel).await,
                Err(e) => {
                    counter!("dgen_conversions_total", "outcome" => "invalid").increment(1);
                    Err(e.into())
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Resolve, assemble and write an already validated description.
    ///
    /// The bundle ID is `bundle_id`, else the description's `draft_id`,
    /// else a fresh UUID.
    pub async fn convert_project(
        &self,
        description: ProjectDescription,
        bundle_id: Option<String>,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<ConversionOutcome> {
        let bundle_id = bundle_id
            .or_else(|| description.draft_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        validate_bundle_id(&bundle_id)?;

        let logger = ConversionLogger::new(&bundle_id, "convert");
        logger.log_start(&format!(
            "'{}' with {} tracks, {} segments",
            description.name,
            description.tracks.len(),
            description.segment_count()
        ));

        let result = self.run(description, &bundle_id, &logger, cancel).await;
        match &result {
            Ok(outcome) => {
                counter!("dgen_conversions_total", "outcome" => "ok").increment(1);
                logger.log_completion(&format!(
                    "{} ({}, {}ms)",
                    outcome.bundle_path.display(),
                    outcome.state,
                    outcome.duration_ms
                ));
            }
            Err(e) => {
                counter!("dgen_conversions_total", "outcome" => e.kind()).increment(1);
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        description: ProjectDescription,
        bundle_id: &str,
        logger: &ConversionLogger,
        cancel: &watch::Receiver<bool>,
    ) -> PipelineResult<ConversionOutcome> {
        let output_root = self.output_root()?;
        let asset_root = effective_asset_root(&self.storage, bundle_id)?;

        let urls = description.media_urls();
        let resolution = self.resolver.resolve(&urls, &asset_root, cancel).await;
        logger.log_progress(&format!(
            "resolved {}/{} media",
            resolution.resources.len(),
            urls.len()
        ));
        if *cancel.borrow() {
            return Err(PipelineError::Cancelled);
        }

        let project = match assemble(description, &resolution.resources) {
            Ok(project) => project,
            Err(e @ AssemblyError::UnresolvedMedia { .. }) => return Err(unresolved(e, &resolution.errors)),
            Err(e) => return Err(e.into()),
        };

        // Any failure left here belongs to a URL no segment needed.
        let resolve_errors = resolution.errors;
        for e in &resolve_errors {
            logger.log_warning(&e.to_string());
        }

        let duration_ms = project.duration_ms;
        let writer = self.writer.clone();
        let id = bundle_id.to_string();
        let report =
            tokio::task::spawn_blocking(move || writer.write(&project, &output_root, &id)).await??;

        Ok(ConversionOutcome {
            bundle_id: bundle_id.to_string(),
            bundle_path: report.bundle_path,
            draft_id: report.draft_id,
            duration_ms,
            state: report.state,
            transitions: report.transitions,
            resolve_errors,
        })
    }

    /// Scan `root` (default: the output root) and rewrite its root index.
    pub async fn refresh_index(&self, root: Option<&Path>) -> PipelineResult<IndexRefresh> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => self.output_root()?,
        };
        let refresh = tokio::task::spawn_blocking(move || -> PipelineResult<IndexRefresh> {
            let index = scan(&root)?;
            let index_path = write_root_meta(&root, &RootMetaInfo::from_index(&index))?;
            Ok(IndexRefresh { index, index_path })
        })
        .await??;
        Ok(refresh)
    }
}

fn unresolved(assembly: AssemblyError, errors: &[ResolveError]) -> PipelineError {
    let cause = match &assembly {
        AssemblyError::UnresolvedMedia { url, .. } => errors.iter().find(|e| &e.url == url).cloned(),
        _ => None,
    };
    match cause {
        Some(cause) => PipelineError::UnresolvedMedia { assembly, cause },
        None => PipelineError::Assembly(assembly),
    }
}
