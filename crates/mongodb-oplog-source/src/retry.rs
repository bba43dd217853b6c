//! Retry with exponential backoff for source reads.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{SourceError, SyncError};

const MAX_RETRIES: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 100;

/// How transient source errors are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles per retry up to 16x
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.saturating_sub(1).min(4))
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// retry budget runs out.
///
/// Nothing is advanced between attempts: callers only update cursors from
/// the successful result.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    stream_id: &str,
    operation: &'static str,
    mut op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut last_error: Option<SourceError> = None;
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                "Retrying {} for {} (attempt {}/{}), waiting {}ms",
                operation,
                stream_id,
                attempt,
                policy.max_retries,
                delay.as_millis()
            );
            sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                tracing::warn!("Transient error in {operation} for {stream_id}: {e}");
                last_error = Some(e);
            }
            Err(error) => {
                return Err(SyncError::Source {
                    stream_id: stream_id.to_string(),
                    operation,
                    error,
                })
            }
        }
    }

    let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
    tracing::error!(
        "{operation} for {stream_id} failed after {} retries. Last error: {last_error}",
        policy.max_retries
    );
    Err(SyncError::RetriesExhausted {
        stream_id: stream_id.to_string(),
        operation,
        attempts: policy.max_retries + 1,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1600));
        assert_eq!(policy.delay_for(9), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), "s", "scan_ids", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SourceError::Transient("connection reset".into()))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        };
        let err = with_retry(&policy, "s", "read_oplog", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(SourceError::Transient("timeout".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            SyncError::RetriesExhausted {
                attempts: 3,
                operation: "read_oplog",
                ..
            }
        ));
        assert_eq!(err.stream_id(), "s");
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&RetryPolicy::default(), "s", "max_id", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(SourceError::Fatal(anyhow::anyhow!("unauthorized")))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, SyncError::Source { .. }));
    }
}
