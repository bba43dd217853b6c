//! Per-stream counters returned by each strategy invocation.

use serde::Serialize;
use std::ops::AddAssign;
use std::time::Duration;

/// Counters for one strategy run over one stream.
///
/// Strategies return a fresh value; the controller owns the running total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncMetrics {
    pub snapshot_rows: u64,
    pub upserts: u64,
    pub tombstones: u64,
    pub schema_changes: u64,
    pub checkpoints_written: u64,
    pub buffer_flushes: u64,
    /// Oplog entries read, including those that produced no event
    pub log_entries: u64,
    pub elapsed: Duration,
}

impl SyncMetrics {
    /// Records emitted of any kind.
    pub fn records(&self) -> u64 {
        self.snapshot_rows + self.upserts + self.tombstones
    }
}

impl AddAssign for SyncMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.snapshot_rows += rhs.snapshot_rows;
        self.upserts += rhs.upserts;
        self.tombstones += rhs.tombstones;
        self.schema_changes += rhs.schema_changes;
        self.checkpoints_written += rhs.checkpoints_written;
        self.buffer_flushes += rhs.buffer_flushes;
        self.log_entries += rhs.log_entries;
        self.elapsed += rhs.elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_and_records() {
        let mut total = SyncMetrics {
            snapshot_rows: 3,
            ..Default::default()
        };
        total += SyncMetrics {
            upserts: 2,
            tombstones: 1,
            elapsed: Duration::from_millis(5),
            ..Default::default()
        };
        assert_eq!(total.records(), 6);
        assert_eq!(total.elapsed, Duration::from_millis(5));
    }
}
