//! Change events and the messages handed to the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field added to tombstone payloads.
pub const DELETED_AT_FIELD: &str = "_sdc_deleted_at";

/// Kind of an emitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Row produced by a full-table snapshot
    SnapshotRow,
    /// Current value of a document (oplog insert, resolved update, incremental scan)
    Upsert,
    /// Deletion; payload carries only `_id` and the deletion marker
    Tombstone,
}

/// One emitted unit of change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub stream_id: String,
    /// Snapshot version the row belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Document converted to JSON
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        kind: ChangeKind,
        stream_id: impl Into<String>,
        version: Option<i64>,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            kind,
            stream_id: stream_id.into(),
            version,
            payload,
            observed_at: Utc::now(),
        }
    }

    /// Identifier of the changed document, as emitted.
    pub fn id(&self) -> Option<&serde_json::Value> {
        self.payload.get(crate::descriptor::ID_FIELD)
    }
}

/// Everything a sink receives, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkMessage {
    /// A change event
    Record(ChangeEvent),

    /// The stream's schema widened
    Schema {
        stream_id: String,
        schema: serde_json::Value,
        key_properties: Vec<String>,
    },

    /// Boundary marker for an atomic snapshot cutover.
    ///
    /// Once the end marker for `version` arrives, data tagged with an older
    /// version may be discarded by the sink.
    ActivateVersion { stream_id: String, version: i64 },

    /// A checkpoint was just persisted
    State {
        stream_id: String,
        checkpoint: serde_json::Value,
    },
}

impl SinkMessage {
    pub fn stream_id(&self) -> &str {
        match self {
            SinkMessage::Record(event) => &event.stream_id,
            SinkMessage::Schema { stream_id, .. }
            | SinkMessage::ActivateVersion { stream_id, .. }
            | SinkMessage::State { stream_id, .. } => stream_id,
        }
    }
}
