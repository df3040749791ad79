use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential,
            initial_delay_ms: 25,
        }
    }
}

/// Re-runs an operation while it fails with a retryable error. Each attempt
/// calls `operation` again, so it re-reads whatever state it depends on.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn execute<F, Fut, T, E, R>(&self, operation: F, retryable: R) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Attempt {}/{}", attempt, max_attempts);

            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !retryable(&err) {
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        warn!(
                            "All {} attempts failed. Last error: {}",
                            max_attempts, err
                        );
                        return Err(err);
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, err, delay
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.policy.initial_delay_ms;

        let delay_ms = match self.policy.backoff {
            Backoff::Fixed => base_delay,
            Backoff::Exponential => {
                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1));
                base_delay.saturating_mul(multiplier)
            }
        };

        Duration::from_millis(delay_ms.min(5_000))
    }
}
