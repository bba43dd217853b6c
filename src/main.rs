//! Command-line interface for oplog-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # One catch-up pass, checkpoints in ./.oplog-sync-checkpoints
//! oplog-sync sync --config oplog-sync.toml --once
//!
//! # Try a config without touching checkpoints
//! oplog-sync sync --config oplog-sync.toml --dry-run --once
//! ```
//!
//! Events go to stdout as JSON lines; logs go to stderr (`RUST_LOG=info`).

use clap::{Parser, Subcommand};
use oplog_sync::{run_sync, SyncArgs};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "oplog-sync")]
#[command(about = "Replicate MongoDB collections from snapshots and the oplog")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate the configured collections
    Sync(SyncArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout carries the event stream
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync(args) => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received shutdown signal, finishing in-flight pages");
                    on_signal.cancel();
                }
            });

            let report = run_sync(args, cancel).await?;
            if !report.is_success() {
                for failure in &report.failures {
                    tracing::error!("{failure}");
                }
                anyhow::bail!("{} of the configured streams failed", report.failures.len());
            }
        }
    }

    Ok(())
}
