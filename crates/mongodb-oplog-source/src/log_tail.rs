//! Oplog tailing.
//!
//! Reads `local.oplog.rs` for one namespace from the persisted position,
//! in pages. Inserts are emitted directly, deletes become tombstones, and
//! updates are resolved in batches through the [`UpdateBuffer`]. The buffer
//! is always resolved before a checkpoint is persisted, so a persisted
//! position never outruns an unresolved update.
//!
//! Reads use `ts >= position`: the entry at the persisted position is
//! processed again after a restart (at-least-once), and the overlap between
//! consecutive pages of one session is skipped.

use bson::Bson;
use checkpoint::CollectionCheckpoint;
use event_sink::EventSink;
use mongodb_types::{bson_to_json, document_to_payload, project_document, OplogPosition};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use sync_core::{ChangeKind, SchemaAccumulator, SyncMetrics, DELETED_AT_FIELD, ID_FIELD};
use tracing::{debug, info, trace, warn};

use crate::context::StreamContext;
use crate::error::SyncError;
use crate::source::{LogOp, SourceDatabase};
use crate::update_buffer::UpdateBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTailOutcome {
    /// No more entries and not following.
    CaughtUp,
    /// Cancellation was requested; progress is persisted.
    Cancelled,
    /// The persisted position is older than anything the oplog retains.
    /// A new snapshot is required.
    AgedOut {
        position: OplogPosition,
        oldest: OplogPosition,
    },
}

pub async fn sync_log_tail<S: SourceDatabase, K: EventSink>(
    ctx: &StreamContext<S, K>,
    checkpoint: &mut CollectionCheckpoint,
    schema: &mut SchemaAccumulator,
) -> Result<(LogTailOutcome, SyncMetrics), SyncError> {
    let started = Instant::now();
    let mut metrics = SyncMetrics::default();
    let stream_id = ctx.stream_id();

    let tagged = checkpoint
        .log_position
        .as_ref()
        .ok_or_else(|| ctx.invalid_state("log tail started without an oplog position"))?;
    let start = OplogPosition::from_tagged(tagged).map_err(|e| ctx.codec_error(e))?;

    let oldest = ctx
        .retry("oldest_oplog_position", || ctx.source.oldest_oplog_position())
        .await?;
    if let Some(oldest) = oldest.filter(|&oldest| start < oldest) {
        warn!(
            "Oplog position {} of {} is older than the oldest retained entry {}",
            start, stream_id, oldest
        );
        return Ok((
            LogTailOutcome::AgedOut {
                position: start,
                oldest,
            },
            metrics,
        ));
    }

    info!("Tailing oplog for {} from {}", stream_id, start);
    let mut tail = Tail {
        ctx,
        version: checkpoint.completed_version(),
        namespace: ctx.descriptor.namespace(),
        projection: ctx.projection(),
        buffer: UpdateBuffer::new(ctx.config.update_buffer_size),
        position: start,
        last_processed: None,
        since_persist: 0,
    };

    let outcome = loop {
        if ctx.is_cancelled() {
            break LogTailOutcome::Cancelled;
        }

        let progressed = tail.read_page(checkpoint, schema, &mut metrics).await?;
        if progressed {
            continue;
        }
        if !ctx.config.follow {
            break LogTailOutcome::CaughtUp;
        }

        trace!("No new oplog entries for {}", stream_id);
        tokio::select! {
            _ = ctx.cancel.cancelled() => break LogTailOutcome::Cancelled,
            _ = tokio::time::sleep(ctx.config.poll_interval) => {}
        }
    };

    tail.flush_and_persist(checkpoint, schema, &mut metrics).await?;
    metrics.elapsed = started.elapsed();
    info!(
        "Oplog tail of {} stopped at {} ({:?}): {} upserts, {} tombstones",
        stream_id, tail.position, outcome, metrics.upserts, metrics.tombstones
    );
    Ok((outcome, metrics))
}

/// Per-session tailing state.
struct Tail<'a, S, K> {
    ctx: &'a StreamContext<S, K>,
    version: Option<i64>,
    namespace: String,
    projection: Option<Vec<String>>,
    buffer: UpdateBuffer,
    /// Position the next read starts from
    position: OplogPosition,
    last_processed: Option<OplogPosition>,
    since_persist: u64,
}

impl<S: SourceDatabase, K: EventSink> Tail<'_, S, K> {
    /// Read and process one page. Returns true if any new entry was processed.
    async fn read_page(
        &mut self,
        checkpoint: &mut CollectionCheckpoint,
        schema: &mut SchemaAccumulator,
        metrics: &mut SyncMetrics,
    ) -> Result<bool, SyncError> {
        let ctx = self.ctx;
        let from = self.position;
        let namespace = self.namespace.as_str();
        // The entry at `from` was already processed unless this is the first read.
        let limit = ctx.config.log_batch_size.max(1) + usize::from(self.last_processed.is_some());
        let entries = ctx
            .retry("read_oplog", || ctx.source.read_oplog(namespace, from, limit))
            .await?;
        debug!(
            "Read {} oplog entries for {} from {}",
            entries.len(),
            ctx.stream_id(),
            from
        );

        let mut previous: Option<OplogPosition> = None;
        let mut progressed = false;
        for entry in entries {
            self.check_order(from, entry.position, previous)?;
            previous = Some(entry.position);

            if matches!(self.last_processed, Some(last) if entry.position <= last) {
                continue;
            }
            progressed = true;
            metrics.log_entries += 1;

            match entry.op {
                LogOp::Insert { document } => {
                    let document = match &self.projection {
                        Some(fields) => project_document(&document, fields),
                        None => document,
                    };
                    ctx.observe_schema(schema, &document, metrics).await?;
                    ctx.emit_record(ChangeKind::Upsert, self.version, document_to_payload(&document))
                        .await?;
                    metrics.upserts += 1;
                }
                LogOp::Update { id } => {
                    trace!("Buffering update of {} in {}", id, ctx.stream_id());
                    self.buffer.insert(id);
                    if self.buffer.is_full() {
                        self.resolve_updates(schema, metrics).await?;
                    }
                }
                LogOp::Delete { id } => {
                    if self.buffer.remove(&id) {
                        trace!("Dropped buffered update of deleted {}", id);
                    }
                    let payload = tombstone_payload(&id, entry.position);
                    ctx.emit_record(ChangeKind::Tombstone, self.version, payload)
                        .await?;
                    metrics.tombstones += 1;
                }
                LogOp::Other { op } => {
                    trace!("Skipping '{}' oplog entry at {}", op, entry.position);
                }
            }

            self.position = entry.position;
            self.last_processed = Some(entry.position);
            checkpoint.log_position = Some(entry.position.to_tagged());
            self.since_persist += 1;

            if self.since_persist >= ctx.config.checkpoint_interval {
                self.flush_and_persist(checkpoint, schema, metrics).await?;
            }
        }

        if progressed {
            self.flush_and_persist(checkpoint, schema, metrics).await?;
        }
        Ok(progressed)
    }

    fn check_order(
        &self,
        from: OplogPosition,
        position: OplogPosition,
        previous: Option<OplogPosition>,
    ) -> Result<(), SyncError> {
        let detail = if position < from {
            format!("entry {position} precedes requested start {from}")
        } else if let Some(previous) = previous.filter(|&previous| position <= previous) {
            format!("entry {position} does not follow {previous}")
        } else {
            return Ok(());
        };
        Err(SyncError::Ordering {
            stream_id: self.ctx.stream_id().to_string(),
            detail,
        })
    }

    /// Fetch the current body of every buffered identifier and emit it, in
    /// buffer order. Documents deleted since are dropped.
    async fn resolve_updates(
        &mut self,
        schema: &mut SchemaAccumulator,
        metrics: &mut SyncMetrics,
    ) -> Result<(), SyncError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let ctx = self.ctx;
        let ids = self.buffer.ids().to_vec();
        let projection = self.projection.as_deref();
        let found = ctx
            .retry("find_by_ids", || {
                ctx.source.find_by_ids(&ctx.descriptor, &ids, projection)
            })
            .await?;
        debug!(
            "Resolved {} of {} buffered updates for {}",
            found.len(),
            ids.len(),
            ctx.stream_id()
        );

        let mut by_id: HashMap<String, bson::Document> = found
            .into_iter()
            .filter_map(|doc| {
                let key = UpdateBuffer::key(doc.get(ID_FIELD)?);
                Some((key, doc))
            })
            .collect();

        for id in &ids {
            if let Some(doc) = by_id.remove(&UpdateBuffer::key(id)) {
                ctx.observe_schema(schema, &doc, metrics).await?;
                ctx.emit_record(ChangeKind::Upsert, self.version, document_to_payload(&doc))
                    .await?;
                metrics.upserts += 1;
            }
        }

        self.buffer.clear();
        metrics.buffer_flushes += 1;
        Ok(())
    }

    /// Resolve buffered updates, then persist if anything moved.
    async fn flush_and_persist(
        &mut self,
        checkpoint: &mut CollectionCheckpoint,
        schema: &mut SchemaAccumulator,
        metrics: &mut SyncMetrics,
    ) -> Result<(), SyncError> {
        self.resolve_updates(schema, metrics).await?;
        if self.since_persist > 0 {
            self.ctx.persist(checkpoint, metrics).await?;
            self.since_persist = 0;
        }
        Ok(())
    }
}

fn tombstone_payload(id: &Bson, position: OplogPosition) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(ID_FIELD.to_string(), bson_to_json(id));
    payload.insert(
        DELETED_AT_FIELD.to_string(),
        Value::String(position.to_rfc3339()),
    );
    payload
}
