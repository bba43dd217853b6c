//! Everything one stream worker needs, plus the emit/persist helpers the
//! strategies share.

use bson::Document;
use checkpoint::{CheckpointStore, CollectionCheckpoint};
use event_sink::EventSink;
use mongodb_types::{document_shape, CodecError};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use sync_core::{
    ChangeEvent, ChangeKind, CollectionDescriptor, SchemaAccumulator, SinkMessage, SyncMetrics,
};
use tokio_util::sync::CancellationToken;

use crate::config::StrategyConfig;
use crate::error::{SourceError, SyncError};
use crate::retry::with_retry;
use crate::source::SourceDatabase;

pub struct StreamContext<S, K> {
    pub source: Arc<S>,
    pub sink: Arc<K>,
    pub store: Arc<dyn CheckpointStore>,
    pub descriptor: CollectionDescriptor,
    pub config: StrategyConfig,
    pub cancel: CancellationToken,
}

impl<S, K> Clone for StreamContext<S, K> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            store: Arc::clone(&self.store),
            descriptor: self.descriptor.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: SourceDatabase, K: EventSink> StreamContext<S, K> {
    pub fn stream_id(&self) -> &str {
        &self.descriptor.stream_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn projection(&self) -> Option<Vec<String>> {
        self.descriptor.effective_projection()
    }

    /// Run one source call under the retry policy.
    pub async fn retry<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        with_retry(&self.config.retry, self.stream_id(), operation, op).await
    }

    pub async fn emit(&self, message: SinkMessage) -> Result<(), SyncError> {
        self.sink.emit(message).await.map_err(|error| SyncError::Sink {
            stream_id: self.stream_id().to_string(),
            error,
        })
    }

    pub async fn emit_record(
        &self,
        kind: ChangeKind,
        version: Option<i64>,
        payload: Map<String, Value>,
    ) -> Result<(), SyncError> {
        let event = ChangeEvent::new(kind, self.stream_id(), version, payload);
        tracing::trace!("Emitting {:?} for {}: {:?}", kind, self.stream_id(), event.id());
        self.emit(SinkMessage::Record(event)).await
    }

    pub async fn emit_activate_version(&self, version: i64) -> Result<(), SyncError> {
        self.emit(SinkMessage::ActivateVersion {
            stream_id: self.stream_id().to_string(),
            version,
        })
        .await
    }

    /// Feed a document to the schema accumulator; announce the schema if it
    /// widened.
    pub async fn observe_schema(
        &self,
        schema: &mut SchemaAccumulator,
        document: &Document,
        metrics: &mut SyncMetrics,
    ) -> Result<(), SyncError> {
        if let Some(updated) = schema.observe(&document_shape(document)) {
            tracing::debug!("Schema of {} widened", self.stream_id());
            metrics.schema_changes += 1;
            self.emit(SinkMessage::Schema {
                stream_id: self.stream_id().to_string(),
                schema: updated,
                key_properties: self.descriptor.key_properties(),
            })
            .await?;
        }
        Ok(())
    }

    /// Write the checkpoint, then tell the sink which state was persisted.
    pub async fn persist(
        &self,
        checkpoint: &CollectionCheckpoint,
        metrics: &mut SyncMetrics,
    ) -> Result<(), SyncError> {
        let stream_id = self.stream_id();
        self.store
            .write(stream_id, checkpoint)
            .await
            .map_err(|error| SyncError::Checkpoint {
                stream_id: stream_id.to_string(),
                error,
            })?;
        metrics.checkpoints_written += 1;

        let state = serde_json::to_value(checkpoint).map_err(|e| SyncError::Checkpoint {
            stream_id: stream_id.to_string(),
            error: e.into(),
        })?;
        self.emit(SinkMessage::State {
            stream_id: stream_id.to_string(),
            checkpoint: state,
        })
        .await
    }

    pub fn codec_error(&self, error: CodecError) -> SyncError {
        SyncError::Codec {
            stream_id: self.stream_id().to_string(),
            error,
        }
    }

    pub fn invalid_state(&self, detail: impl Into<String>) -> SyncError {
        SyncError::InvalidState {
            stream_id: self.stream_id().to_string(),
            detail: detail.into(),
        }
    }
}
