//! Filesystem-based checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::store::CheckpointStore;
use crate::{CheckpointFile, CollectionCheckpoint};

/// Filesystem implementation of CheckpointStore trait.
///
/// Stores one pretty-printed JSON file per stream, `<dir>/<stream_id>.json`.
/// Writes go to a temporary file in the same directory which is then renamed
/// over the previous file, so readers never see a partial checkpoint.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for a stream.
    pub fn path_for(&self, stream_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(stream_id)))
    }
}

/// Stream ids are user supplied; keep file names inside the directory.
fn file_stem(stream_id: &str) -> String {
    stream_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn read(&self, stream_id: &str) -> Result<Option<CollectionCheckpoint>> {
        let path = self.path_for(stream_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let file: CheckpointFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint file {}", path.display()))?;
        Ok(Some(file.into_checkpoint(stream_id)?))
    }

    async fn write(&self, stream_id: &str, checkpoint: &CollectionCheckpoint) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;

        let file = CheckpointFile::new(stream_id, checkpoint.clone());
        let path = self.path_for(stream_id);
        let tmp = self.dir.join(format!(".{}.json.tmp", file_stem(stream_id)));

        std::fs::write(&tmp, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move checkpoint into {}", path.display()))?;

        tracing::debug!("Stored checkpoint for {stream_id} to {}", path.display());
        Ok(())
    }
}
