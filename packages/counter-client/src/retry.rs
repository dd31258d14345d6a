//! Exponential-backoff retry for rate-limited RPC calls.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use crate::errors::RpcError;

/// Errors that can tell the retry wrapper whether they are worth retrying.
pub trait RetryClassify {
    /// Whether the failure was caused by rate limiting.
    fn is_rate_limited(&self) -> bool;

    /// Minimum wait requested by the upstream, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl RetryClassify for RpcError {
    fn is_rate_limited(&self) -> bool {
        RpcError::is_rate_limited(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        RpcError::retry_after(self)
    }
}

/// Bounded exponential backoff applied only to rate-limit failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`: `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `operation`, retrying it while it fails with a rate-limit error.
    ///
    /// Any other failure is returned immediately and unmodified. Once
    /// `max_retries` retries are used up the last failure is returned.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_rate_limited() {
                        return Err(err);
                    }
                    if attempt >= self.max_retries {
                        warn!(
                            "Rate limited after {} attempts, giving up: {}",
                            attempt + 1,
                            err
                        );
                        return Err(err);
                    }

                    let mut delay = self.delay_for(attempt);
                    if let Some(hint) = err.retry_after() {
                        delay = delay.max(hint).min(self.max_delay);
                    }
                    debug!(
                        "Server responded with 429. Retrying after {:?} (attempt {}/{})",
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
