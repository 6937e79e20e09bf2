//! Retry Mechanism Module
//!
//! Exponential backoff retry for the bridge's non-streaming path. The
//! streaming path never retries mid-stream: once bytes have reached the
//! caller, restarting would violate at-most-once delivery.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::GatewayError;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier (for exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays. Off by default so the documented
    /// backoff sequence holds exactly.
    pub use_jitter: bool,
    /// Maximum jitter fraction (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            use_jitter: false,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy for `retries` retries after the initial attempt.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries + 1,
            ..Self::default()
        }
    }

    /// Set total attempt count
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set initial delay
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Set jitter factor
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Whether an error should be retried. Decided solely from the error's
    /// own retryability flag.
    pub fn should_retry(&self, error: &GatewayError) -> bool {
        error.is_retryable()
    }

    /// Delay before retry number `attempt` (0-based: attempt 0 is the delay
    /// after the first failure). `min(initial · multiplier^attempt, max)`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(base_delay as u64).min(self.max_delay);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-jitter_range..=jitter_range);

        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}

/// Retry executor that handles the actual retry loop
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Execute a fallible async operation under the policy.
    ///
    /// Cancellation surfaces as [`GatewayError::Cancelled`] and stops the
    /// loop immediately without a backoff wait.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        return Err(error);
                    }
                    last_error = Some(error);

                    if attempt == self.policy.max_attempts - 1 {
                        break;
                    }

                    let delay = self.policy.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GatewayError::internal("retry executor failed without error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_success_on_second_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(
            RetryPolicy::with_retries(2).with_initial_delay(Duration::from_millis(1)),
        );

        let result = executor
            .execute(|_| {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count == 0 {
                        Err(GatewayError::provider(500, "server error"))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retryable_error_uses_full_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        // retries = 2 means exactly 3 attempts total.
        let executor = RetryExecutor::new(
            RetryPolicy::with_retries(2).with_initial_delay(Duration::from_millis(1)),
        );

        let result: Result<(), GatewayError> = executor
            .execute(|_| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Network("reset".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_makes_one_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(RetryPolicy::with_retries(5));

        let result: Result<(), GatewayError> = executor
            .execute(|_| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::validation("bad request"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(RetryPolicy::with_retries(5));

        let result: Result<(), GatewayError> = executor
            .execute(|_| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Cancelled)
                }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Cancelled)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_follows_documented_formula() {
        let policy = RetryPolicy::default();
        // min(1000 * 2^(attempt), 10000) for the delay after attempt n.
        assert_eq!(policy.calculate_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.calculate_delay(4), Duration::from_millis(10_000));
        assert_eq!(policy.calculate_delay(10), Duration::from_millis(10_000));
    }
}
