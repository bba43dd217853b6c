//! Tunables shared by all strategies.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Sync options (non-connection related)
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Documents per full-table or key-based page
    pub batch_size: usize,
    /// Persist at least every this many records or oplog entries
    pub checkpoint_interval: u64,
    /// Capacity of the update-intent buffer
    pub update_buffer_size: usize,
    /// Oplog entries per read
    pub log_batch_size: usize,
    /// Wait between empty oplog reads in follow mode
    pub poll_interval: Duration,
    /// Keep tailing after catching up, until cancelled
    pub follow: bool,
    pub retry: RetryPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            checkpoint_interval: 1000,
            update_buffer_size: 500,
            log_batch_size: 1000,
            poll_interval: Duration::from_millis(500),
            follow: false,
            retry: RetryPolicy::default(),
        }
    }
}
