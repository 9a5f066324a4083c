use crate::error::{Result, ScoringError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout and retry settings for store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first
    pub attempts: u32,
    /// Per-call timeout
    pub timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_count);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run a store call under the policy's timeout, retrying transient failures.
///
/// `call` is invoked afresh for every attempt, so a batch write is always
/// retried as a whole.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ScoringError::StoreTimeout(operation.to_string())),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                let delay = policy.backoff_duration(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation, attempt, policy.attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
