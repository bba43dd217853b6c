//! oplog-sync
//!
//! Replicates MongoDB collections as a stream of JSON change events:
//! resumable snapshots, oplog tailing, and key-based incremental scans,
//! each resumable from a per-collection checkpoint.
//!
//! The replication engine lives in `oplog_sync_mongodb_source`; this crate
//! adds the config file and the `sync` command.
//!
//! # CLI Usage
//!
//! ```bash
//! # Catch up every configured collection and exit
//! oplog-sync sync --config oplog-sync.toml --once
//!
//! # Tail until Ctrl-C, URI from the environment
//! OPLOG_SYNC_MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0 \
//!   oplog-sync sync --config oplog-sync.toml
//! ```

pub mod config;
pub mod sync;

pub use config::{Config, SourceConfig, SyncConfig};
pub use sync::{run_sync, SyncArgs};
