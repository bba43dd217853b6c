//! Checkpoint storage trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::CollectionCheckpoint;

/// Key-value storage of per-stream checkpoints.
///
/// `write` must be atomic: a concurrent or later `read` observes either the
/// previous checkpoint or the new one, never a mix. Implementations:
/// - Filesystem storage (`FilesystemStore`)
/// - In-process storage (`MemoryStore`)
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint of a stream.
    ///
    /// Returns None if the stream has never been checkpointed.
    async fn read(&self, stream_id: &str) -> Result<Option<CollectionCheckpoint>>;

    /// Replace the checkpoint of a stream.
    async fn write(&self, stream_id: &str, checkpoint: &CollectionCheckpoint) -> Result<()>;
}
