//! Retry logic with exponential backoff
//!
//! Attempts are strictly sequential: attempt *k+1* starts only after
//! attempt *k* has settled and its backoff has elapsed.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay; attempt *k* waits `base_delay * 2^(k-1)`
    pub base_delay: Duration,
    /// Upper bound on any single delay; a longer server hint is not retried
    pub max_delay: Duration,
    /// Add random jitter in `[0, base_delay)` to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Set maximum attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set maximum delay
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay after the given failed attempt, before jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
    }

    /// Delay after the given failed attempt (1-based), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff(attempt);
        if self.jitter && !self.base_delay.is_zero() {
            let spread = self.base_delay.as_millis().max(1) as u64;
            let jitter_ms = rand::thread_rng().gen_range(0..spread);
            delay += Duration::from_millis(jitter_ms);
        }
        delay.min(self.max_delay)
    }

    /// Execute an async operation with retry logic
    ///
    /// # Arguments
    /// * `operation` - Async operation to retry
    /// * `is_retryable` - Function to determine if an error should trigger a retry
    ///
    /// # Errors
    ///
    /// Returns the last error, unchanged, once it is not retryable or
    /// attempts are exhausted.
    ///
    /// # Example
    /// ```ignore
    /// let policy = RetryPolicy::default();
    /// let result = policy
    ///     .execute(|| async { fetch_filing().await }, |e| e.retryable())
    ///     .await;
    /// ```
    pub async fn execute<T, E, F, Fut, R>(
        &self,
        operation: F,
        is_retryable: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Debug,
    {
        self.execute_with_hint(operation, is_retryable, |_| None).await
    }

    /// Like [`RetryPolicy::execute`], honouring a per-error minimum delay
    ///
    /// `delay_hint` lets an error (e.g. a rate limit carrying `retry_after`)
    /// stretch the backoff; the result is still capped at `max_delay`.
    ///
    /// # Errors
    ///
    /// Same as [`RetryPolicy::execute`].
    pub async fn execute_with_hint<T, E, F, Fut, R, H>(
        &self,
        mut operation: F,
        is_retryable: R,
        delay_hint: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        H: Fn(&E) -> Option<Duration>,
        E: std::fmt::Debug,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if attempt >= self.max_attempts || !is_retryable(&e) {
                        debug!(
                            attempt = attempt,
                            error = ?e,
                            "Operation failed, no more retries"
                        );
                        return Err(RetryError {
                            last_error: e,
                            attempts: attempt,
                        });
                    }

                    let delay = match delay_hint(&e) {
                        Some(hint) => self.delay_for(attempt).max(hint).min(self.max_delay),
                        None => self.delay_for(attempt),
                    };
                    warn!(
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = ?e,
                        "Operation failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Error type for retry operations
#[derive(Debug)]
pub struct RetryError<E> {
    /// The last error encountered
    pub last_error: E,
    /// Total number of attempts made
    pub attempts: u32,
}

impl<E> RetryError<E> {
    /// Discard the attempt count
    pub fn into_inner(self) -> E {
        self.last_error
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Operation failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}
