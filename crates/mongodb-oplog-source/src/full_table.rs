//! Resumable full-table snapshot.
//!
//! A snapshot attempt scans `_id` ascending from the resume cursor up to the
//! high watermark captured when the attempt started. The attempt's version
//! and watermark never change while it is resumed, so rows inserted after the
//! attempt began are left to the oplog.
//!
//! The sink sees one `activate_version` marker when an attempt starts and
//! one when it finishes. Markers are emitted before the checkpoint that
//! records them is persisted: a crash in between causes at worst a marker
//! repeat, never a missing one.

use bson::Bson;
use checkpoint::CollectionCheckpoint;
use chrono::Utc;
use event_sink::EventSink;
use mongodb_types::{decode_bson, document_to_payload, encode_bson, CursorValue};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::time::Instant;
use sync_core::{ChangeKind, SchemaAccumulator, SyncMetrics, ID_FIELD};
use tracing::{debug, info};

use crate::context::StreamContext;
use crate::error::SyncError;
use crate::source::SourceDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullTableOutcome {
    /// The attempt finished and its end marker was emitted.
    Completed { version: i64 },
    /// Cancellation was requested; progress is persisted.
    Cancelled,
}

/// Last version handed out by this process. A checkpoint reset forgets the
/// previous version, so uniqueness within a run is tracked here.
static LAST_VERSION: AtomicI64 = AtomicI64::new(0);

/// Version token for a new attempt: milliseconds since epoch, strictly
/// greater than the previous attempt's and than any version issued earlier
/// in this process.
pub fn next_snapshot_version(previous: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    let floor = previous.unwrap_or(i64::MIN);
    let next = |last: i64| now.max(last.max(floor).saturating_add(1));
    match LAST_VERSION.fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |last| {
        Some(next(last))
    }) {
        Ok(last) | Err(last) => next(last),
    }
}

pub async fn sync_full_table<S: SourceDatabase, K: EventSink>(
    ctx: &StreamContext<S, K>,
    checkpoint: &mut CollectionCheckpoint,
    schema: &mut SchemaAccumulator,
) -> Result<(FullTableOutcome, SyncMetrics), SyncError> {
    let started = Instant::now();
    let mut metrics = SyncMetrics::default();
    let stream_id = ctx.stream_id();

    let previous = checkpoint.snapshot_version;
    let version = match previous {
        Some(version) if checkpoint.snapshot_in_progress() => {
            info!(
                "Resuming snapshot {} of {} after {}",
                version,
                stream_id,
                checkpoint
                    .resume_cursor
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "start".to_string())
            );
            version
        }
        _ => {
            let max_id = ctx
                .retry("max_id", || ctx.source.max_id(&ctx.descriptor))
                .await?;
            let high_watermark = max_id
                .as_ref()
                .map(encode_bson)
                .transpose()
                .map_err(|e| ctx.codec_error(e))?;
            let version = next_snapshot_version(previous);

            info!(
                "Starting snapshot {} of {} (high watermark: {})",
                version,
                stream_id,
                high_watermark
                    .as_ref()
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "empty collection".to_string())
            );
            checkpoint.begin_snapshot(version, high_watermark);
            ctx.emit_activate_version(version).await?;
            ctx.persist(checkpoint, &mut metrics).await?;
            version
        }
    };

    let upper = checkpoint
        .high_watermark
        .as_ref()
        .map(decode_bson)
        .transpose()
        .map_err(|e| ctx.codec_error(e))?;

    if let Some(upper) = upper {
        if scan(ctx, checkpoint, schema, version, &upper, &mut metrics).await? {
            ctx.persist(checkpoint, &mut metrics).await?;
            metrics.elapsed = started.elapsed();
            info!("Snapshot {} of {} interrupted by cancellation", version, stream_id);
            return Ok((FullTableOutcome::Cancelled, metrics));
        }
    }

    checkpoint.complete_snapshot();
    ctx.emit_activate_version(version).await?;
    ctx.persist(checkpoint, &mut metrics).await?;

    metrics.elapsed = started.elapsed();
    info!(
        "Completed snapshot {} of {}: {} rows in {:?}",
        version, stream_id, metrics.snapshot_rows, metrics.elapsed
    );
    Ok((FullTableOutcome::Completed { version }, metrics))
}

/// Scan pages until the watermark is reached. Returns true if cancelled.
async fn scan<S: SourceDatabase, K: EventSink>(
    ctx: &StreamContext<S, K>,
    checkpoint: &mut CollectionCheckpoint,
    schema: &mut SchemaAccumulator,
    version: i64,
    upper: &Bson,
    metrics: &mut SyncMetrics,
) -> Result<bool, SyncError> {
    let upper_value = CursorValue::from_bson(upper).map_err(|e| ctx.codec_error(e))?;
    let mut lower = checkpoint
        .resume_cursor
        .as_ref()
        .map(decode_bson)
        .transpose()
        .map_err(|e| ctx.codec_error(e))?;
    let projection = ctx.projection();
    let batch_size = ctx.config.batch_size.max(1);
    let mut since_persist = 0u64;

    loop {
        if ctx.is_cancelled() {
            return Ok(true);
        }

        let page = ctx
            .retry("scan_ids", || {
                ctx.source.scan_ids(
                    &ctx.descriptor,
                    lower.as_ref(),
                    upper,
                    projection.as_deref(),
                    batch_size,
                )
            })
            .await?;
        let page_len = page.len();
        debug!("Fetched {} rows of {}", page_len, ctx.stream_id());

        for doc in page {
            let id = doc
                .get(ID_FIELD)
                .cloned()
                .ok_or_else(|| ctx.invalid_state("scanned document has no _id"))?;
            let id_value = CursorValue::from_bson(&id).map_err(|e| ctx.codec_error(e))?;
            if id_value.bson_cmp(&upper_value) == Ordering::Greater {
                return Err(ctx.invalid_state(format!(
                    "scan returned _id {id} beyond high watermark {upper}"
                )));
            }

            ctx.observe_schema(schema, &doc, metrics).await?;
            ctx.emit_record(ChangeKind::SnapshotRow, Some(version), document_to_payload(&doc))
                .await?;
            checkpoint.advance_snapshot(mongodb_types::encode(&id_value));
            metrics.snapshot_rows += 1;
            since_persist += 1;
            lower = Some(id);

            if since_persist >= ctx.config.checkpoint_interval {
                ctx.persist(checkpoint, metrics).await?;
                since_persist = 0;
            }
        }

        if since_persist > 0 {
            ctx.persist(checkpoint, metrics).await?;
            since_persist = 0;
        }

        if page_len < batch_size {
            return Ok(false);
        }
    }
}
