//! Arbor node binary.
//!
//! Builds the fork tree from the development genesis block, replays a
//! JSON-lines file of candidate blocks through the ingest task and prints the
//! resulting chain summary as JSON.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use arbor_core::genesis;
use arbor_core::types::Block;
use arbor_node_lib::{IngestHandle, LogFormat, Node, NodeConfig};

/// Arbor node: fork-aware UTXO chain manager.
#[derive(Parser, Debug)]
#[command(
    name = "arbor-node",
    version,
    about = "Replay candidate blocks into an Arbor fork tree"
)]
struct Args {
    /// Config file (TOML). Defaults to the per-user config file if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines file of candidate blocks, one block per line
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Blocks a branch may lag the best tip and still be extended
    #[arg(long)]
    cut_off_age: Option<u64>,

    /// Capacity of the ingest channel
    #[arg(long)]
    ingest_queue_depth: Option<usize>,
}

impl Args {
    /// Load layered configuration, then apply CLI overrides.
    fn load_config(&self) -> Result<NodeConfig> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => NodeConfig::default_path().filter(|p| p.exists()),
        };
        let mut config = NodeConfig::load(path.as_deref()).context("failed to load node configuration")?;

        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(age) = self.cut_off_age {
            config.chain.cut_off_age = age;
        }
        if let Some(depth) = self.ingest_queue_depth {
            config.ingest_queue_depth = depth;
        }
        config.validate().context("invalid command-line override")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    init_logging(&config.log_level, config.log_format);

    info!("Arbor node v{}", env!("CARGO_PKG_VERSION"));
    info!("cut_off_age: {}", config.chain.cut_off_age);
    info!("ingest_queue_depth: {}", config.ingest_queue_depth);

    let node = Node::new(genesis::dev_genesis().clone(), config);
    let (height, hash) = node.chain_tip();
    info!("chain_tip: height={height} hash={hash}");

    if let Some(path) = &args.blocks {
        let ingest = node.spawn_ingest();
        tokio::select! {
            result = replay(path, &ingest) => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("received Ctrl+C, stopping replay");
            }
        }
        let summary = ingest.finish().await;
        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            tip_changes = summary.tip_changes,
            pruned = summary.pruned,
            "replay complete"
        );
    }

    let stats = node.stats();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("failed to encode chain summary")?
    );
    Ok(())
}

/// Stream blocks from a JSON-lines file into the ingest task.
///
/// Blank lines are skipped. A line that does not parse aborts the replay.
async fn replay(path: &Path, ingest: &IngestHandle) -> Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut submitted = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let block: Block = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid block", path.display(), index + 1))?;
        ingest
            .submit(block)
            .await
            .context("ingest task stopped before replay finished")?;
        submitted += 1;
    }
    info!(submitted, "queued all blocks from {}", path.display());
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level_str: &str, format: LogFormat) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init(),
    }
}
