//! MongoDB change-data-capture for oplog-sync
//!
//! Replicates MongoDB collections to an [`event_sink::EventSink`] with one of
//! three strategies per collection:
//!
//! - full table: resumable snapshot by ascending `_id` up to a high watermark
//! - log based: one snapshot, then tail `local.oplog.rs`
//! - incremental: ascending scan over a replication key
//!
//! The [`Controller`] runs one worker per collection and persists progress
//! through a [`checkpoint::CheckpointStore`], so an interrupted run resumes
//! where it stopped.

pub mod config;
mod context;
pub mod controller;
pub mod error;
pub mod full_table;
pub mod incremental;
pub mod log_tail;
mod mongo;
pub mod retry;
pub mod source;
pub mod update_buffer;

#[cfg(test)]
mod testing;


pub use config::StrategyConfig;
pub use context::StreamContext;
pub use controller::{Controller, StreamOutcome, StreamReport, SyncReport};
pub use error::{SourceError, SyncError};
pub use full_table::{next_snapshot_version, sync_full_table, FullTableOutcome};
pub use incremental::{sync_incremental, IncrementalOutcome};
pub use log_tail::{sync_log_tail, LogTailOutcome};
pub use mongo::{MongoSource, SourceOpts};
pub use retry::RetryPolicy;
pub use source::{KeyBound, LogEntry, LogOp, SourceDatabase};
pub use update_buffer::UpdateBuffer;
