//! Per-collection replication state.

use serde::{Deserialize, Serialize};
use sync_core::TaggedValue;

/// Replication state of one stream.
///
/// Holds the full-table sub-state (`snapshot_version`, `high_watermark`,
/// `resume_cursor`, `completed`), the log-tail sub-state (`log_position`) and
/// the key-based incremental sub-state (`replication_key_value`).
///
/// # File Format
///
/// ```json
/// {
///     "completed": false,
///     "snapshot_version": 1700000000000,
///     "high_watermark": {"value": "3", "type": "int64"},
///     "resume_cursor": {"value": "2", "type": "int64"},
///     "log_position": {"value": "1700000000.1", "type": "timestamp"},
///     "replication_key_value": null
/// }
/// ```
///
/// Operators may edit this by hand: clearing `snapshot_version` forces a new
/// snapshot, advancing `log_position` skips a log window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionCheckpoint {
    /// Whether the last snapshot attempt finished.
    #[serde(default)]
    pub completed: bool,

    /// Version token of the current (or last completed) snapshot attempt,
    /// milliseconds since epoch when the attempt started.
    #[serde(default)]
    pub snapshot_version: Option<i64>,

    /// Largest `_id` at the moment the snapshot attempt started.
    #[serde(default)]
    pub high_watermark: Option<TaggedValue>,

    /// `_id` of the last row emitted by the snapshot attempt.
    #[serde(default)]
    pub resume_cursor: Option<TaggedValue>,

    /// Oplog timestamp to resume tailing from.
    #[serde(default)]
    pub log_position: Option<TaggedValue>,

    /// Last replication-key value seen by key-based incremental sync.
    #[serde(default)]
    pub replication_key_value: Option<TaggedValue>,
}

impl CollectionCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot attempt was started and has not finished.
    pub fn snapshot_in_progress(&self) -> bool {
        self.snapshot_version.is_some() && !self.completed
    }

    /// Start a new snapshot attempt, discarding any previous full-table state.
    pub fn begin_snapshot(&mut self, version: i64, high_watermark: Option<TaggedValue>) {
        self.completed = false;
        self.snapshot_version = Some(version);
        self.high_watermark = high_watermark;
        self.resume_cursor = None;
    }

    pub fn advance_snapshot(&mut self, cursor: TaggedValue) {
        self.resume_cursor = Some(cursor);
    }

    /// Mark the snapshot attempt finished. The version is kept so later
    /// log-tail events can refer to it.
    pub fn complete_snapshot(&mut self) {
        self.completed = true;
        self.high_watermark = None;
        self.resume_cursor = None;
    }

    /// Version of the last completed snapshot, if any.
    pub fn completed_version(&self) -> Option<i64> {
        if self.completed {
            self.snapshot_version
        } else {
            None
        }
    }
}
