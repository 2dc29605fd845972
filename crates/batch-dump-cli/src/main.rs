//! Batch Dump CLI
//!
//! Offline replay of the per-batch dump pipeline. Recorded batches (line ids
//! plus named tensors) are loaded from a JSON fixture and dumped exactly as a
//! training worker would, which makes it possible to check sampling and
//! record layout against downstream readers without running training.
//!
//! # Commands
//!
//! - `replay`: Dump recorded batches to a file or stdout
//!
//! Exit codes: 0 success, 1 I/O failure, 2 invalid configuration,
//! 3 malformed fixture.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;
mod fixture;

/// Batch Dump CLI - replay training batches through the dump pipeline
#[derive(Parser)]
#[command(name = "batch-dump")]
#[command(version)]
#[command(about = "Replay recorded training batches through the field/parameter dump pipeline")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump recorded batches with a dump configuration
    ///
    /// Field records and parameter lines go to --output, or stdout when it
    /// is omitted. Logs always go to stderr.
    Replay(commands::replay::ReplayArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Replay(args) => commands::replay::handle_replay(args).await,
    };

    std::process::exit(exit_code);
}
