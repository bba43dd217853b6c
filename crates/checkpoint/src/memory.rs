//! In-process checkpoint storage.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::CheckpointStore;
use crate::CollectionCheckpoint;

/// Checkpoints held in memory for the lifetime of the process.
///
/// Used for dry runs and tests. Only the latest checkpoint of each stream is
/// kept, plus a count of writes. Writes for a stream can be made to fail
/// after a number of successes, to exercise checkpoint-failure handling.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    current: HashMap<String, CollectionCheckpoint>,
    writes: HashMap<String, usize>,
    write_limits: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing checkpoint.
    pub fn with_checkpoint(self, stream_id: impl Into<String>, checkpoint: CollectionCheckpoint) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.current.insert(stream_id.into(), checkpoint);
        }
        self
    }

    /// Reject writes for `stream_id` once `count` of them have succeeded.
    pub fn failing_after(self, stream_id: impl Into<String>, count: usize) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.write_limits.insert(stream_id.into(), count);
        }
        self
    }

    /// Accept writes for `stream_id` again.
    pub fn recover(&self, stream_id: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.write_limits.remove(stream_id);
        }
    }

    /// Current checkpoint of a stream, without going through the async trait.
    pub fn get(&self, stream_id: &str) -> Option<CollectionCheckpoint> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.current.get(stream_id).cloned())
    }

    /// Number of successful writes for a stream.
    pub fn write_count(&self, stream_id: &str) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.writes.get(stream_id).copied())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn read(&self, stream_id: &str) -> Result<Option<CollectionCheckpoint>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?;
        Ok(inner.current.get(stream_id).cloned())
    }

    async fn write(&self, stream_id: &str, checkpoint: &CollectionCheckpoint) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Checkpoint store lock poisoned"))?;
        let written = inner.writes.get(stream_id).copied().unwrap_or_default();
        if inner
            .write_limits
            .get(stream_id)
            .is_some_and(|limit| written >= *limit)
        {
            anyhow::bail!("Checkpoint write for {stream_id} rejected after {written} writes");
        }
        inner
            .current
            .insert(stream_id.to_string(), checkpoint.clone());
        *inner.writes.entry(stream_id.to_string()).or_default() += 1;
        Ok(())
    }
}
