//! JSON-lines sink.

use anyhow::{Context, Result};
use sync_core::SinkMessage;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::EventSink;

/// Writes each message as one line of JSON.
///
/// Lines from concurrent streams never interleave mid-line: the writer is
/// held for the whole line.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> EventSink for JsonLinesSink<W> {
    async fn emit(&self, message: SinkMessage) -> Result<()> {
        let mut line = serde_json::to_vec(&message).context("Failed to serialize sink message")?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .context("Failed to write sink message")?;
        writer.flush().await.context("Failed to flush sink")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use sync_core::{ChangeEvent, ChangeKind};

    #[tokio::test]
    async fn test_one_message_per_line() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(SinkMessage::ActivateVersion {
            stream_id: "s".into(),
            version: 7,
        })
        .await
        .unwrap();

        let mut payload = serde_json::Map::new();
        payload.insert("_id".into(), json!(1));
        sink.emit(SinkMessage::Record(ChangeEvent::new(
            ChangeKind::Upsert,
            "s",
            Some(7),
            payload,
        )))
        .await
        .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "activate_version");
        assert_eq!(lines[0]["version"], 7);
        assert_eq!(lines[1]["type"], "record");
        assert_eq!(lines[1]["payload"]["_id"], 1);
    }
}
