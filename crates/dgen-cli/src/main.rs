//! `dgen` binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{info, warn};

use dgen_bundle::{scan, write_root_meta, RootMetaInfo};
use dgen_cli::{init_tracing, AppConfig, ConversionOutcome, ConversionPipeline, PipelineError, PipelineResult};
use dgen_models::{input_schema, validate_document};

#[derive(Parser, Debug)]
#[command(
    name = "dgen",
    author,
    version,
    about = "Convert JSON project descriptions into editor draft bundles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a single-draft or batch document into bundles
    Convert(ConvertArgs),
    /// Validate a document without downloading anything
    Validate {
        /// Input JSON file, `-` for stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Scan a directory of bundles
    Scan(ScanArgs),
    /// Print the JSON Schema of accepted documents
    Schema,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input JSON file, `-` for stdin
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Write bundles here instead of the configured root
    #[arg(short = 'o', long, value_name = "DIR", env = "DGEN_OUTPUT_ROOT")]
    output_root: Option<PathBuf>,

    /// Bundle ID for a single-draft document
    #[arg(long, value_name = "ID")]
    bundle_id: Option<String>,

    /// Refresh root_meta_info.json afterwards
    #[arg(long)]
    index: bool,
}

#[derive(Parser, Debug)]
struct ScanArgs {
    /// Root directory holding bundles
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Also write root_meta_info.json into ROOT
    #[arg(long)]
    write_index: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs a command; `Ok(false)` when it completed with failures.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Convert(args) => convert(args).await,
        Commands::Validate { file } => validate(&file),
        Commands::Scan(args) => scan_root(args),
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&input_schema())?);
            Ok(true)
        }
    }
}

async fn convert(args: ConvertArgs) -> anyhow::Result<bool> {
    let config = AppConfig::from_env();
    info!(data_root = %config.data_root.display(), transfer = config.transfer_enabled, "Loaded configuration");

    let mut pipeline = ConversionPipeline::from_config(&config).context("failed to set up the pipeline")?;
    if let Some(root) = args.output_root {
        pipeline = pipeline.with_output_root(root);
    }

    let raw = read_input(&args.file)?;
    if args.bundle_id.is_some() && is_batch(&raw) {
        anyhow::bail!("--bundle-id requires a single-draft document; batch drafts take their IDs from `draft_id`");
    }
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling downloads");
            let _ = cancel_tx.send(true);
        }
    });

    let outcomes = match args.bundle_id {
        Some(id) => vec![pipeline.convert_with_id(&raw, Some(&id), &cancel_rx).await],
        None => match pipeline.convert_document(&raw, &cancel_rx).await {
            Ok(outcomes) => outcomes,
            Err(e) => vec![Err(e)],
        },
    };

    let all_ok = outcomes.iter().all(Result::is_ok);
    let report: Vec<_> = outcomes.iter().map(outcome_json).collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.index {
        let refresh = pipeline.refresh_index(None).await?;
        info!(path = %refresh.index_path.display(), bundles = refresh.index.count, "Index refreshed");
    }
    Ok(all_ok)
}

fn is_batch(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw).is_ok_and(|doc| doc.get("drafts").is_some())
}

fn outcome_json(outcome: &PipelineResult<ConversionOutcome>) -> serde_json::Value {
    match outcome {
        Ok(outcome) => json!({ "ok": true, "outcome": outcome }),
        Err(e) => error_json(e),
    }
}

fn error_json(e: &PipelineError) -> serde_json::Value {
    json!({
        "ok": false,
        "error": {
            "kind": e.kind(),
            "location": e.location(),
            "message": e.to_string(),
        }
    })
}

fn validate(file: &Path) -> anyhow::Result<bool> {
    let raw = read_input(file)?;
    let drafts = match validate_document(&raw) {
        Ok(drafts) => drafts,
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&json!([{ "ok": false, "error": e }]))?);
            return Ok(false);
        }
    };

    let all_ok = drafts.iter().all(Result::is_ok);
    let report: Vec<_> = drafts
        .iter()
        .map(|draft| match draft {
            Ok(d) => json!({
                "ok": true,
                "name": d.name,
                "tracks": d.tracks.len(),
                "segments": d.segment_count(),
            }),
            Err(e) => json!({ "ok": false, "error": e }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(all_ok)
}

fn scan_root(args: ScanArgs) -> anyhow::Result<bool> {
    let index = scan(&args.root).with_context(|| format!("failed to scan {}", args.root.display()))?;
    for warning in &index.warnings {
        warn!(bundle = %warning.bundle, "{}", warning.message);
    }
    if args.write_index {
        let path = write_root_meta(&args.root, &RootMetaInfo::from_index(&index))?;
        info!(path = %path.display(), "Index written");
    }
    println!("{}", serde_json::to_string_pretty(&index)?);
    Ok(true)
}

fn read_input(file: &Path) -> anyhow::Result<String> {
    if file.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}
