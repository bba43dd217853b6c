//! In-memory sink.

use anyhow::Result;
use std::sync::Mutex;
use sync_core::{ChangeEvent, SinkMessage};

use crate::EventSink;

/// Collects every message in memory.
///
/// Can be told to start failing after a number of messages, to exercise
/// sink-failure handling.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<SinkMessage>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message once `count` messages have been accepted.
    pub fn failing_after(count: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    /// All accepted messages, in emission order.
    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Messages of one stream.
    pub fn messages_for(&self, stream_id: &str) -> Vec<SinkMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.stream_id() == stream_id)
            .collect()
    }

    /// Change events of one stream.
    pub fn records(&self, stream_id: &str) -> Vec<ChangeEvent> {
        self.messages_for(stream_id)
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::Record(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Versions carried by `activate_version` markers of one stream.
    pub fn activated_versions(&self, stream_id: &str) -> Vec<i64> {
        self.messages_for(stream_id)
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::ActivateVersion { version, .. } => Some(version),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

#[async_trait::async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, message: SinkMessage) -> Result<()> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| anyhow::anyhow!("Sink lock poisoned"))?;
        if let Some(limit) = self.fail_after {
            if messages.len() >= limit {
                anyhow::bail!("Sink rejected message after {limit} messages");
            }
        }
        messages.push(message);
        Ok(())
    }
}
