//! Checkpoint storage selection.

use std::path::PathBuf;
use std::sync::Arc;

use crate::{CheckpointStore, FilesystemStore, MemoryStore};

/// Default directory for checkpoint files.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".oplog-sync-checkpoints";

/// Where checkpoints are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStorage {
    /// One JSON file per stream in a directory.
    Filesystem { dir: PathBuf },

    /// Kept in memory only; nothing survives the process.
    ///
    /// Used for dry runs.
    Memory,
}

impl Default for CheckpointStorage {
    fn default() -> Self {
        CheckpointStorage::Filesystem {
            dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
        }
    }
}

impl CheckpointStorage {
    /// Build the configured store.
    pub fn open(&self) -> Arc<dyn CheckpointStore> {
        match self {
            CheckpointStorage::Filesystem { dir } => Arc::new(FilesystemStore::new(dir.clone())),
            CheckpointStorage::Memory => Arc::new(MemoryStore::new()),
        }
    }

    /// Check if checkpoints survive a restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, CheckpointStorage::Filesystem { .. })
    }
}
