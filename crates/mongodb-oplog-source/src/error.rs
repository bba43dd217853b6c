//! Error types for source access and per-stream sync failures.

use mongodb_types::{CodecError, OplogPosition};
use thiserror::Error;

/// Failure of one call against the source database.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network blip, server selection timeout, pool reset. Retried.
    #[error("transient source error: {0}")]
    Transient(String),

    /// Anything else. Not retried.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

impl From<mongodb::error::Error> for SourceError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        if matches!(
            e.kind.as_ref(),
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
        ) {
            SourceError::Transient(e.to_string())
        } else {
            SourceError::Fatal(e.into())
        }
    }
}

/// Fatal failure of one stream's worker.
///
/// Every variant carries the stream id so the operator can tell which
/// collection failed; the stream's last persisted checkpoint stays intact.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("[{stream_id}] {operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        stream_id: String,
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("[{stream_id}] {operation} failed: {error}")]
    Source {
        stream_id: String,
        operation: &'static str,
        #[source]
        error: SourceError,
    },

    #[error("[{stream_id}] cursor codec error: {error}")]
    Codec {
        stream_id: String,
        #[source]
        error: CodecError,
    },

    #[error("[{stream_id}] oplog ordering violated: {detail}")]
    Ordering { stream_id: String, detail: String },

    #[error("[{stream_id}] checkpoint persistence failed: {error:#}")]
    Checkpoint {
        stream_id: String,
        error: anyhow::Error,
    },

    #[error("[{stream_id}] sink rejected message: {error:#}")]
    Sink {
        stream_id: String,
        error: anyhow::Error,
    },

    #[error("[{stream_id}] {detail}")]
    InvalidState { stream_id: String, detail: String },

    #[error(
        "[{stream_id}] oplog aged out again right after a fresh snapshot \
         (position {position}, oldest retained {oldest}); the oplog window is shorter than a snapshot"
    )]
    RetentionExceeded {
        stream_id: String,
        position: OplogPosition,
        oldest: OplogPosition,
    },

    #[error("[{stream_id}] worker task failed: {detail}")]
    Worker { stream_id: String, detail: String },
}

impl SyncError {
    pub fn stream_id(&self) -> &str {
        match self {
            SyncError::RetriesExhausted { stream_id, .. }
            | SyncError::Source { stream_id, .. }
            | SyncError::Codec { stream_id, .. }
            | SyncError::Ordering { stream_id, .. }
            | SyncError::Checkpoint { stream_id, .. }
            | SyncError::Sink { stream_id, .. }
            | SyncError::InvalidState { stream_id, .. }
            | SyncError::RetentionExceeded { stream_id, .. }
            | SyncError::Worker { stream_id, .. } => stream_id,
        }
    }
}
