//! Replay recorded batches through the dump pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Dump with config/dump.toml + BATCH_DUMP__* overrides, to stdout
//! batch-dump replay --batches batches.json
//!
//! # Explicit config, four workers, hash sampling every 100th instance
//! batch-dump replay --config dump.toml --batches batches.json \
//!     --workers 4 --mode hash --interval 100 --output part-000
//! ```
//!
//! Batches are dealt round-robin to the workers. Each worker owns a
//! `DumpWorker`; all of them feed one channel drained by a single writer
//! task, so lines from different workers interleave in arrival order.

use std::path::PathBuf;
use std::sync::Arc;

use batch_dump_core::{ChannelSink, DumpConfig, DumpMode, DumpWorker};
use clap::{Args, ValueEnum};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

use crate::error::{CliError, CliExitCode};
use crate::fixture::{BatchFile, BatchFixture};

/// Sampling mode override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Off,
    Full,
    Hash,
    Random,
}

impl From<ModeArg> for DumpMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => DumpMode::Off,
            ModeArg::Full => DumpMode::Full,
            ModeArg::Hash => DumpMode::Hash,
            ModeArg::Random => DumpMode::Random,
        }
    }
}

/// Arguments for the replay command.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Dump configuration TOML; layered config/ files and env when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON batch fixture file
    #[arg(long)]
    pub batches: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent dump workers, capped at the number of batches
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Override the configured sampling mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override the configured sampling interval
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Totals across all workers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub batches: usize,
    pub field_lines: usize,
    pub param_lines: usize,
    pub skipped: usize,
    pub lines_written: usize,
}

impl ReplaySummary {
    fn merge(&mut self, other: ReplaySummary) {
        self.batches += other.batches;
        self.field_lines += other.field_lines;
        self.param_lines += other.param_lines;
        self.skipped += other.skipped;
    }
}

/// Execute the replay command and return the process exit code.
pub async fn handle_replay(args: ReplayArgs) -> i32 {
    match run_replay(args).await {
        Ok(summary) => {
            info!(
                batches = summary.batches,
                field_lines = summary.field_lines,
                param_lines = summary.param_lines,
                skipped = summary.skipped,
                "replay finished"
            );
            CliExitCode::Success.into()
        }
        Err(e) => {
            error!("replay failed: {}", e);
            e.exit_code().into()
        }
    }
}

pub async fn run_replay(args: ReplayArgs) -> Result<ReplaySummary, CliError> {
    let config = load_config(&args)?;
    let content = tokio::fs::read_to_string(&args.batches).await?;
    let file: BatchFile = serde_json::from_str(&content)?;

    // No more workers than batches; an idle shard would only hold a sender.
    let workers = args.workers.clamp(1, file.batches.len().max(1));
    debug!(requested = args.workers, workers, "dealing batches");
    let mut shards: Vec<Vec<BatchFixture>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, batch) in file.batches.into_iter().enumerate() {
        shards[i % workers].push(batch);
    }

    let (sink, rx) = ChannelSink::unbounded();
    let writer = tokio::spawn(write_lines(rx, args.output.clone()));

    let mut handles = Vec::with_capacity(workers);
    for (shard_id, shard) in shards.into_iter().enumerate() {
        let worker = DumpWorker::new(config.clone(), Arc::new(sink.clone()))?;
        handles.push(tokio::task::spawn_blocking(move || {
            replay_shard(shard_id, &worker, shard)
        }));
    }
    // Workers hold the remaining senders; the writer stops once they finish.
    drop(sink);

    let mut summary = ReplaySummary::default();
    let mut first_err = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(shard)) => summary.merge(shard),
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Err(e) => {
                first_err.get_or_insert(CliError::Worker(e.to_string()));
            }
        }
    }

    let written = writer
        .await
        .map_err(|e| CliError::Worker(e.to_string()))??;
    if let Some(e) = first_err {
        return Err(e);
    }
    summary.lines_written = written;
    Ok(summary)
}

fn load_config(args: &ReplayArgs) -> Result<DumpConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => DumpConfig::from_file(path)?,
        None => DumpConfig::load()?,
    };
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    config.validate()?;
    Ok(config)
}

fn replay_shard(
    shard_id: usize,
    worker: &DumpWorker,
    batches: Vec<BatchFixture>,
) -> Result<ReplaySummary, CliError> {
    let mut summary = ReplaySummary::default();
    for fixture in batches {
        let (batch_id, scope, reader) = fixture.into_parts()?;
        let report = worker.dump_batch(&scope, &reader, batch_id)?;
        if let Some(fields) = report.fields {
            summary.field_lines += fields.lines_written;
            summary.skipped += fields.skipped.len();
        }
        if let Some(params) = report.params {
            summary.param_lines += params.lines_written;
            summary.skipped += params.skipped.len();
        }
        summary.batches += 1;
        debug!(shard = shard_id, batch_id, "batch dumped");
    }
    Ok(summary)
}

async fn write_lines(
    mut rx: UnboundedReceiver<String>,
    output: Option<PathBuf>,
) -> Result<usize, CliError> {
    let target: Box<dyn AsyncWrite + Unpin + Send> = match output {
        Some(path) => Box::new(tokio::fs::File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    };
    let mut out = BufWriter::new(target);
    let mut count = 0;
    while let Some(line) = rx.recv().await {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        count += 1;
    }
    out.flush().await?;
    Ok(count)
}
