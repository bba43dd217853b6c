//! The `sync` command.

use anyhow::Context;
use checkpoint::{CheckpointStorage, DEFAULT_CHECKPOINT_DIR};
use clap::Args;
use event_sink::JsonLinesSink;
use oplog_sync_mongodb_source::{Controller, MongoSource, SourceOpts, SyncReport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Config file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// MongoDB connection string, overrides `[source].uri`
    #[arg(long, env = "OPLOG_SYNC_MONGODB_URI")]
    pub uri: Option<String>,

    /// Directory to keep checkpoint files in
    #[arg(long, default_value = DEFAULT_CHECKPOINT_DIR)]
    pub checkpoint_dir: PathBuf,

    /// Catch up once and exit, even if the config enables follow mode
    #[arg(long)]
    pub once: bool,

    /// Keep checkpoints in memory only; the next run starts over
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    /// Where checkpoints go for these arguments.
    pub fn checkpoint_storage(&self) -> CheckpointStorage {
        if self.dry_run {
            CheckpointStorage::Memory
        } else {
            CheckpointStorage::Filesystem {
                dir: self.checkpoint_dir.clone(),
            }
        }
    }

    /// Connection string from the flag or the config file.
    pub fn resolve_uri(&self, config: &Config) -> anyhow::Result<String> {
        self.uri
            .clone()
            .or_else(|| config.source.uri.clone())
            .context("No MongoDB URI: pass --uri, set OPLOG_SYNC_MONGODB_URI or [source].uri")
    }
}

/// Run every configured collection until caught up (or cancelled in
/// follow mode), writing the event stream to stdout.
pub async fn run_sync(args: SyncArgs, cancel: CancellationToken) -> anyhow::Result<SyncReport> {
    let config = Config::from_file(&args.config)?;
    let uri = args.resolve_uri(&config)?;

    let mut strategy = config.sync.strategy_config();
    if args.once {
        strategy.follow = false;
    }

    let storage = args.checkpoint_storage();
    if !storage.is_durable() {
        tracing::info!("Running in dry-run mode - checkpoints are not persisted");
    }

    tracing::info!(
        "Starting sync of {} collections (follow: {})",
        config.collections.len(),
        strategy.follow
    );

    let mut opts = SourceOpts::new(uri);
    opts.connect_timeout = config.source.connect_timeout;
    let source = MongoSource::connect(&opts)
        .await
        .context("Failed to connect to MongoDB")?;

    let controller = Controller::new(
        Arc::new(source),
        Arc::new(JsonLinesSink::stdout()),
        storage.open(),
        strategy,
    )
    .with_cancellation(cancel);

    let report = controller.run(&config.collections).await;

    let total = report.total_metrics();
    tracing::info!(
        "Sync finished: {} streams ok, {} failed, {} records, {} checkpoints",
        report.streams.len(),
        report.failures.len(),
        total.records(),
        total.checkpoints_written
    );
    Ok(report)
}
