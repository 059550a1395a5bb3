//! Retry policy for read-only RPC calls

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use super::ChainError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        // from_millis(b) yields b, b^2, ...; factor keeps the first delay at base_delay_ms
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms / 2)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .map(jitter)
            .take(self.max_retries)
    }

    /// Run `action`, retrying while the error is retryable.
    pub async fn run<T, A, Fut>(&self, action: A) -> Result<T, ChainError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        RetryIf::spawn(self.strategy(), action, |err: &ChainError| {
            let retry = err.is_retryable();
            if retry {
                tracing::debug!(error = %err, "Retrying RPC read");
            }
            retry
        })
        .await
    }
}
