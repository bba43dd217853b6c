//! Key-based incremental replication.
//!
//! Scans `replication_key >= bookmark` ascending and remembers the largest
//! key value seen. Ties on the bookmark are re-read on the next run, so the
//! boundary is at-least-once. Within one run, pages continue strictly after
//! the last `(key, _id)` pair.

use bson::Bson;
use checkpoint::CollectionCheckpoint;
use event_sink::EventSink;
use mongodb_types::{decode_bson, document_to_payload, encode_bson};
use std::time::Instant;
use sync_core::{ChangeKind, SchemaAccumulator, SyncMetrics, ID_FIELD};
use tracing::{debug, info, trace};

use crate::context::StreamContext;
use crate::error::SyncError;
use crate::full_table::next_snapshot_version;
use crate::source::{KeyBound, SourceDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalOutcome {
    Completed,
    Cancelled,
}

pub async fn sync_incremental<S: SourceDatabase, K: EventSink>(
    ctx: &StreamContext<S, K>,
    checkpoint: &mut CollectionCheckpoint,
    schema: &mut SchemaAccumulator,
) -> Result<(IncrementalOutcome, SyncMetrics), SyncError> {
    let started = Instant::now();
    let mut metrics = SyncMetrics::default();
    let stream_id = ctx.stream_id();

    let field = ctx
        .descriptor
        .replication_key
        .clone()
        .ok_or_else(|| ctx.invalid_state("incremental replication requires a replication_key"))?;

    let version = match checkpoint.snapshot_version {
        Some(version) => version,
        None => {
            let version = next_snapshot_version(None);
            info!("Assigned version {} to incremental stream {}", version, stream_id);
            checkpoint.snapshot_version = Some(version);
            ctx.emit_activate_version(version).await?;
            ctx.persist(checkpoint, &mut metrics).await?;
            version
        }
    };

    let mut bound = match &checkpoint.replication_key_value {
        Some(bookmark) => KeyBound::From(decode_bson(bookmark).map_err(|e| ctx.codec_error(e))?),
        None => KeyBound::Start,
    };
    info!("Scanning {} by {} from {:?}", stream_id, field, bound);

    let projection = ctx.projection();
    let batch_size = ctx.config.batch_size.max(1);
    let outcome = loop {
        if ctx.is_cancelled() {
            break IncrementalOutcome::Cancelled;
        }

        let page = ctx
            .retry("scan_by_key", || {
                ctx.source.scan_by_key(
                    &ctx.descriptor,
                    &field,
                    &bound,
                    projection.as_deref(),
                    batch_size,
                )
            })
            .await?;
        let page_len = page.len();
        debug!("Fetched {} rows of {} by {}", page_len, stream_id, field);

        let mut last_pair: Option<(Bson, Bson)> = None;
        for doc in page {
            ctx.observe_schema(schema, &doc, &mut metrics).await?;
            ctx.emit_record(ChangeKind::Upsert, Some(version), document_to_payload(&doc))
                .await?;
            metrics.upserts += 1;

            match doc.get(&field) {
                Some(key) if !matches!(key, Bson::Null) => {
                    checkpoint.replication_key_value =
                        Some(encode_bson(key).map_err(|e| ctx.codec_error(e))?);
                    if let Some(id) = doc.get(ID_FIELD) {
                        last_pair = Some((key.clone(), id.clone()));
                    }
                }
                _ => trace!("Document in {} has no {}; bookmark unchanged", stream_id, field),
            }
        }

        if page_len > 0 {
            ctx.persist(checkpoint, &mut metrics).await?;
        }
        if page_len < batch_size {
            break IncrementalOutcome::Completed;
        }
        match last_pair {
            Some((key, id)) => bound = KeyBound::After { key, id },
            // A full page without a single keyed document cannot advance.
            None => {
                return Err(ctx.invalid_state(format!(
                    "a full page of {stream_id} had no {field} values"
                )))
            }
        }
    };

    metrics.elapsed = started.elapsed();
    info!(
        "Incremental sync of {} finished ({:?}): {} rows",
        stream_id, outcome, metrics.upserts
    );
    Ok((outcome, metrics))
}
