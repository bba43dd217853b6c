//! Checkpoint management for oplog-sync
//!
//! Persists the replication position of every stream so that a sync can
//! resume after a restart without losing unseen data.
//!
//! # Architecture
//!
//! - [`CollectionCheckpoint`] holds the per-stream state
//! - [`CheckpointFile`] wraps it for on-disk serialization
//! - [`CheckpointStore`] abstracts the storage backend
//! - [`CheckpointStorage`] selects a backend from configuration
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores checkpoints as JSON files, one per stream
//! - `MemoryStore` - Keeps checkpoints in memory (dry runs, tests)

mod collection;
mod config;
mod file;
mod filesystem;
mod memory;
pub mod store;


pub use collection::CollectionCheckpoint;
pub use config::{CheckpointStorage, DEFAULT_CHECKPOINT_DIR};
pub use file::CheckpointFile;
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use store::CheckpointStore;
