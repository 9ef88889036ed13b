//! Artifact Store CLI
//!
//! The `artifacts` command inspects and rewrites saved artifact directories.
//!
//! ## Commands
//!
//! - `inspect`: Summarize the passes and fields of a saved directory
//! - `copy`: Load a directory and save it elsewhere (re-streams every trace)
//! - `log-assets`: Print one `loggedAsset` line per trace and protocol log

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use artifact_store::{ArtifactSet, ArtifactStore, StoreConfig, METRICS};

#[derive(Parser)]
#[command(name = "artifacts")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and rewrite saved capture artifact directories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Store configuration file (JSON); missing keys use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a saved artifact directory
    Inspect {
        /// Artifact directory
        dir: PathBuf,

        /// Emit JSON output instead of terminal text
        #[arg(long)]
        json: bool,
    },

    /// Load an artifact directory and save it to another directory
    Copy {
        /// Source artifact directory
        src: PathBuf,

        /// Destination directory (stale pass files there are removed)
        dst: PathBuf,

        /// Trace events per streamed chunk
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Print every trace and protocol log as a `loggedAsset` line
    LogAssets {
        /// Artifact directory
        dir: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct PassSummary {
    name: String,
    events: usize,
    trace_fields: Vec<String>,
    protocol_messages: Option<usize>,
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    dir: PathBuf,
    fields: Vec<String>,
    passes: Vec<PassSummary>,
}

fn summarize(dir: &Path, artifacts: &ArtifactSet) -> InspectSummary {
    let mut names: Vec<&String> = artifacts
        .traces
        .keys()
        .chain(artifacts.protocol_logs.keys())
        .collect();
    names.sort();
    names.dedup();

    let passes = names
        .into_iter()
        .map(|name| {
            let trace = artifacts.traces.get(name);
            PassSummary {
                name: name.clone(),
                events: trace.map(|t| t.events.len()).unwrap_or(0),
                trace_fields: trace
                    .map(|t| t.extra.keys().cloned().collect())
                    .unwrap_or_default(),
                protocol_messages: artifacts.protocol_logs.get(name).map(Vec::len),
            }
        })
        .collect();

    InspectSummary {
        dir: dir.to_path_buf(),
        fields: artifacts.fields.keys().cloned().collect(),
        passes,
    }
}

fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let raw = std::fs::read(path).with_context(|| format!("read config {:?}", path))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse config {:?}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    artifact_store::init_tracing(cli.json_logs, level);

    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Inspect { dir, json } => cmd_inspect(config, &dir, json).await,
        Commands::Copy {
            src,
            dst,
            batch_size,
        } => {
            let config = match batch_size {
                Some(n) => config.with_batch_size(n),
                None => config,
            };
            cmd_copy(config, &src, &dst).await
        }
        Commands::LogAssets { dir } => cmd_log_assets(config, &dir).await,
    };

    METRICS.flush();
    result
}

async fn cmd_inspect(config: StoreConfig, dir: &Path, json: bool) -> Result<()> {
    let store = ArtifactStore::new(config);
    let artifacts = store
        .load(dir)
        .await
        .with_context(|| format!("load artifacts from {:?}", dir))?;
    let summary = summarize(dir, &artifacts);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Artifacts: {}", summary.dir.display());
    println!("Fields ({}):", summary.fields.len());
    for field in &summary.fields {
        println!("  {}", field);
    }
    println!("Passes ({}):", summary.passes.len());
    for pass in &summary.passes {
        let log = pass
            .protocol_messages
            .map(|n| format!("{} protocol messages", n))
            .unwrap_or_else(|| "no protocol log".to_string());
        println!("  {:<24} {:>8} events   {}", pass.name, pass.events, log);
    }
    Ok(())
}

async fn cmd_copy(config: StoreConfig, src: &Path, dst: &Path) -> Result<()> {
    let store = ArtifactStore::new(config);
    let artifacts = store
        .load(src)
        .await
        .with_context(|| format!("load artifacts from {:?}", src))?;
    store
        .save(&artifacts, dst)
        .await
        .with_context(|| format!("save artifacts to {:?}", dst))?;

    info!(src = %src.display(), dst = %dst.display(), "artifacts copied");
    println!(
        "Copied {} passes from {} to {}",
        artifacts.traces.len(),
        src.display(),
        dst.display()
    );
    Ok(())
}

async fn cmd_log_assets(config: StoreConfig, dir: &Path) -> Result<()> {
    let store = ArtifactStore::new(config);
    let artifacts = store
        .load(dir)
        .await
        .with_context(|| format!("load artifacts from {:?}", dir))?;
    let assets = store
        .log_assets(&artifacts, None)
        .await
        .context("render assets")?;
    for asset in assets {
        println!("{}", asset);
    }
    Ok(())
}
