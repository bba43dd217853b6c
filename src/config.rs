//! Config file loading.
//!
//! ```toml
//! [source]
//! uri = "mongodb://localhost:27017/?replicaSet=rs0"
//!
//! [sync]
//! batch_size = 1000
//! update_buffer_size = 500
//! poll_interval = "500ms"
//! follow = true
//!
//! [[collections]]
//! stream_id = "shop-orders"
//! database = "shop"
//! collection = "orders"
//! replication_method = "log_based"
//! ```

pub mod duration;

use anyhow::Context;
use oplog_sync_mongodb_source::{RetryPolicy, StrategyConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use sync_core::{CollectionDescriptor, ReplicationMethod};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub collections: Vec<CollectionDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// MongoDB connection string; the CLI flag takes precedence
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default = "default_connect_timeout", deserialize_with = "duration::deserialize")]
    pub connect_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// The `[sync]` table. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub checkpoint_interval: u64,
    pub update_buffer_size: usize,
    pub log_batch_size: usize,
    #[serde(deserialize_with = "duration::deserialize")]
    pub poll_interval: Duration,
    pub follow: bool,
    pub max_retries: u32,
    #[serde(deserialize_with = "duration::deserialize")]
    pub retry_base_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let defaults = StrategyConfig::default();
        Self {
            batch_size: defaults.batch_size,
            checkpoint_interval: defaults.checkpoint_interval,
            update_buffer_size: defaults.update_buffer_size,
            log_batch_size: defaults.log_batch_size,
            poll_interval: defaults.poll_interval,
            follow: defaults.follow,
            max_retries: defaults.retry.max_retries,
            retry_base_delay: defaults.retry.base_delay,
        }
    }
}

impl SyncConfig {
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            batch_size: self.batch_size,
            checkpoint_interval: self.checkpoint_interval,
            update_buffer_size: self.update_buffer_size,
            log_batch_size: self.log_batch_size,
            poll_interval: self.poll_interval,
            follow: self.follow,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: self.retry_base_delay,
            },
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {path:?}"))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no strategy could run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("batch_size", self.sync.batch_size),
            ("update_buffer_size", self.sync.update_buffer_size),
            ("log_batch_size", self.sync.log_batch_size),
        ] {
            if value == 0 {
                anyhow::bail!("sync.{name} must be greater than zero");
            }
        }
        if self.sync.checkpoint_interval == 0 {
            anyhow::bail!("sync.checkpoint_interval must be greater than zero");
        }

        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.stream_id.as_str()) {
                anyhow::bail!("Duplicate stream_id: {}", collection.stream_id);
            }
            if collection.replication_method == ReplicationMethod::Incremental
                && collection.replication_key.is_none()
            {
                anyhow::bail!(
                    "Stream {} uses incremental replication but has no replication_key",
                    collection.stream_id
                );
            }
        }
        Ok(())
    }
}
