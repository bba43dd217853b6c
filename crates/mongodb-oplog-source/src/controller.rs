//! Replication controller.
//!
//! Picks a strategy per collection and runs one worker per selected
//! collection concurrently. Workers share the source, sink and checkpoint
//! store but nothing else; a failing worker is reported with its stream id
//! and the others keep running.

use checkpoint::{CheckpointStore, CollectionCheckpoint};
use chrono::Utc;
use event_sink::EventSink;
use mongodb_types::OplogPosition;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sync_core::{
    CollectionDescriptor, ReplicationMethod, SchemaAccumulator, SinkMessage, SyncMetrics,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::StrategyConfig;
use crate::context::StreamContext;
use crate::error::SyncError;
use crate::full_table::{sync_full_table, FullTableOutcome};
use crate::incremental::{sync_incremental, IncrementalOutcome};
use crate::log_tail::{sync_log_tail, LogTailOutcome};
use crate::source::SourceDatabase;

/// How a stream's worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    /// Not selected
    Skipped,
    /// Full-table snapshot or incremental scan finished
    Completed,
    /// Log-based stream processed every available oplog entry
    CaughtUp,
    /// Stopped by cancellation with progress persisted
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub stream_id: String,
    pub method: ReplicationMethod,
    pub outcome: StreamOutcome,
    pub metrics: SyncMetrics,
}

/// Result of one controller run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Streams that finished, ordered by stream id
    pub streams: Vec<StreamReport>,
    /// Streams that failed
    pub failures: Vec<SyncError>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn stream(&self, stream_id: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream_id == stream_id)
    }

    /// Metrics summed over every finished stream.
    pub fn total_metrics(&self) -> SyncMetrics {
        let mut total = SyncMetrics::default();
        for stream in &self.streams {
            total += stream.metrics.clone();
        }
        total
    }
}

pub struct Controller<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    store: Arc<dyn CheckpointStore>,
    config: StrategyConfig,
    cancel: CancellationToken,
}

impl<S, K> Controller<S, K>
where
    S: SourceDatabase + 'static,
    K: EventSink + 'static,
{
    pub fn new(
        source: Arc<S>,
        sink: Arc<K>,
        store: Arc<dyn CheckpointStore>,
        config: StrategyConfig,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops every worker at its next page boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replicate every selected collection once (or until cancelled in
    /// follow mode). Never fails as a whole; per-stream failures are in
    /// the report.
    pub async fn run(&self, collections: &[CollectionDescriptor]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut workers: JoinSet<Result<StreamReport, SyncError>> = JoinSet::new();
        let mut task_streams = HashMap::new();
        let mut seen = HashSet::new();

        for descriptor in collections {
            if !descriptor.selected {
                info!("Skipping unselected stream {}", descriptor.stream_id);
                report.streams.push(StreamReport {
                    stream_id: descriptor.stream_id.clone(),
                    method: descriptor.replication_method,
                    outcome: StreamOutcome::Skipped,
                    metrics: SyncMetrics::default(),
                });
                continue;
            }
            if !seen.insert(descriptor.stream_id.clone()) {
                report.failures.push(SyncError::InvalidState {
                    stream_id: descriptor.stream_id.clone(),
                    detail: "stream id is configured more than once".to_string(),
                });
                continue;
            }

            let ctx = StreamContext {
                source: Arc::clone(&self.source),
                sink: Arc::clone(&self.sink),
                store: Arc::clone(&self.store),
                descriptor: descriptor.clone(),
                config: self.config.clone(),
                cancel: self.cancel.clone(),
            };
            info!(
                "Starting {} worker for {} ({})",
                descriptor.replication_method,
                descriptor.stream_id,
                descriptor.namespace()
            );
            let handle = workers.spawn(run_stream(ctx));
            task_streams.insert(handle.id(), descriptor.stream_id.clone());
        }

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((_, Ok(stream))) => {
                    info!(
                        "Stream {} finished ({:?}): {} records",
                        stream.stream_id,
                        stream.outcome,
                        stream.metrics.records()
                    );
                    report.streams.push(stream);
                }
                Ok((_, Err(e))) => {
                    error!("Stream {} failed: {}", e.stream_id(), e);
                    report.failures.push(e);
                }
                Err(join_err) => {
                    let stream_id = task_streams
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_default();
                    error!("Worker for {} died: {}", stream_id, join_err);
                    report.failures.push(SyncError::Worker {
                        stream_id,
                        detail: join_err.to_string(),
                    });
                }
            }
        }

        report.streams.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        report
    }
}

async fn run_stream<S: SourceDatabase, K: EventSink>(
    ctx: StreamContext<S, K>,
) -> Result<StreamReport, SyncError> {
    let stream_id = ctx.stream_id().to_string();
    let method = ctx.descriptor.replication_method;

    let mut checkpoint = ctx
        .store
        .read(&stream_id)
        .await
        .map_err(|error| SyncError::Checkpoint {
            stream_id: stream_id.clone(),
            error,
        })?
        .unwrap_or_default();

    let mut schema = match &ctx.descriptor.schema {
        Some(declared) => {
            let schema = SchemaAccumulator::from_json_schema(declared);
            ctx.emit(SinkMessage::Schema {
                stream_id: stream_id.clone(),
                schema: schema.to_json_schema(),
                key_properties: ctx.descriptor.key_properties(),
            })
            .await?;
            schema
        }
        None => SchemaAccumulator::new(),
    };

    let mut metrics = SyncMetrics::default();
    let outcome = match method {
        ReplicationMethod::FullTable => {
            let (outcome, m) = sync_full_table(&ctx, &mut checkpoint, &mut schema).await?;
            metrics += m;
            match outcome {
                FullTableOutcome::Completed { .. } => StreamOutcome::Completed,
                FullTableOutcome::Cancelled => StreamOutcome::Cancelled,
            }
        }
        ReplicationMethod::Incremental => {
            let (outcome, m) = sync_incremental(&ctx, &mut checkpoint, &mut schema).await?;
            metrics += m;
            match outcome {
                IncrementalOutcome::Completed => StreamOutcome::Completed,
                IncrementalOutcome::Cancelled => StreamOutcome::Cancelled,
            }
        }
        ReplicationMethod::LogBased => {
            run_log_based(&ctx, &mut checkpoint, &mut schema, &mut metrics).await?
        }
    };

    Ok(StreamReport {
        stream_id,
        method,
        outcome,
        metrics,
    })
}

/// Snapshot if needed, then tail. An aged-out position discards the
/// checkpoint and restarts with a fresh snapshot, at most once per run.
async fn run_log_based<S: SourceDatabase, K: EventSink>(
    ctx: &StreamContext<S, K>,
    checkpoint: &mut CollectionCheckpoint,
    schema: &mut SchemaAccumulator,
    metrics: &mut SyncMetrics,
) -> Result<StreamOutcome, SyncError> {
    if let Some(tagged) = &checkpoint.log_position {
        let position = OplogPosition::from_tagged(tagged).map_err(|e| ctx.codec_error(e))?;
        let oldest = ctx
            .retry("oldest_oplog_position", || ctx.source.oldest_oplog_position())
            .await?;
        if let Some(oldest) = oldest.filter(|&oldest| position < oldest) {
            warn!(
                "Checkpoint of {} at {} is older than the oplog ({}); starting a new snapshot",
                ctx.stream_id(),
                position,
                oldest
            );
            *checkpoint = CollectionCheckpoint::new();
        }
    }

    let mut restarted = false;
    loop {
        if !checkpoint.completed {
            if checkpoint.log_position.is_none() {
                let newest = ctx
                    .retry("newest_oplog_position", || ctx.source.newest_oplog_position())
                    .await?;
                let position = newest.unwrap_or_else(wall_clock_position);
                info!("Oplog position of {} recorded at {}", ctx.stream_id(), position);
                checkpoint.log_position = Some(position.to_tagged());
                ctx.persist(checkpoint, metrics).await?;
            }

            let (outcome, m) = sync_full_table(ctx, checkpoint, schema).await?;
            *metrics += m;
            if outcome == FullTableOutcome::Cancelled {
                return Ok(StreamOutcome::Cancelled);
            }
        }

        let (outcome, m) = sync_log_tail(ctx, checkpoint, schema).await?;
        *metrics += m;
        match outcome {
            LogTailOutcome::CaughtUp => return Ok(StreamOutcome::CaughtUp),
            LogTailOutcome::Cancelled => return Ok(StreamOutcome::Cancelled),
            LogTailOutcome::AgedOut { position, oldest } if restarted => {
                return Err(SyncError::RetentionExceeded {
                    stream_id: ctx.stream_id().to_string(),
                    position,
                    oldest,
                });
            }
            LogTailOutcome::AgedOut { position, oldest } => {
                warn!(
                    "Oplog of {} aged out at {} (oldest {}); starting a new snapshot",
                    ctx.stream_id(),
                    position,
                    oldest
                );
                *checkpoint = CollectionCheckpoint::new();
                restarted = true;
            }
        }
    }
}

/// Position used when the oplog is empty.
fn wall_clock_position() -> OplogPosition {
    let secs = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
    OplogPosition::new(secs, 0)
}
