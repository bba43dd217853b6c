//! EventSink trait definition.

use anyhow::Result;
use sync_core::SinkMessage;

/// Receiver of the ordered message stream produced by a sync.
///
/// Messages of one stream arrive in program order: schema before the
/// records that need it, `activate_version` markers around each snapshot,
/// and a `state` message after every persisted checkpoint. Messages of
/// different streams may interleave.
///
/// # Usage Pattern
///
/// Strategies take the sink as a generic parameter:
///
/// ```ignore
/// pub async fn sync_full_table<S: SourceDatabase, K: EventSink>(
///     source: &S,
///     sink: &K,
///     ...
/// ) -> Result<FullTableOutcome, SyncError> {
///     sink.emit(SinkMessage::Record(event)).await?;
/// }
/// ```
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one message. An error is fatal for the emitting stream.
    async fn emit(&self, message: SinkMessage) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    async fn emit(&self, message: SinkMessage) -> Result<()> {
        (**self).emit(message).await
    }
}
