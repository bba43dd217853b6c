//! Checkpoint file wrapper for on-disk serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CollectionCheckpoint;

/// On-disk envelope around a [`CollectionCheckpoint`].
///
/// # File Format
///
/// ```json
/// {
///     "stream_id": "shop-orders",
///     "checkpoint": {
///         "completed": true,
///         "snapshot_version": 1700000000000,
///         "log_position": {"value": "1700000100.3", "type": "timestamp"}
///     },
///     "updated_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Stream the checkpoint belongs to
    pub stream_id: String,
    pub checkpoint: CollectionCheckpoint,
    /// When this file was last written
    pub updated_at: DateTime<Utc>,
}

impl CheckpointFile {
    pub fn new(stream_id: impl Into<String>, checkpoint: CollectionCheckpoint) -> Self {
        Self {
            stream_id: stream_id.into(),
            checkpoint,
            updated_at: Utc::now(),
        }
    }

    /// Take the checkpoint out, validating that it belongs to `stream_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was written for a different stream, which
    /// happens when files are copied between checkpoint directories by hand.
    pub fn into_checkpoint(self, stream_id: &str) -> anyhow::Result<CollectionCheckpoint> {
        if self.stream_id != stream_id {
            anyhow::bail!(
                "Checkpoint stream mismatch: expected '{}', found '{}'",
                stream_id,
                self.stream_id
            );
        }
        Ok(self.checkpoint)
    }
}
