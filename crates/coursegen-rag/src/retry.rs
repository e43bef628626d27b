//! Bounded retry with exponential backoff
//!
//! Both external gateways share this policy object instead of relying on a
//! client library default. Every attempt runs under its own wall-clock
//! timeout; an elapsed timeout counts as a retryable failure.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::error::{Error, Result};
use crate::providers::ProviderError;

/// Retry policy for one external call type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
    /// Random spread applied to each delay, as a fraction (0.0-1.0)
    pub jitter: f64,
    /// Hard wall-clock limit per attempt
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: 0.2,
            attempt_timeout_ms: 30_000,
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug, Clone)]
pub struct RetryFailure {
    /// Attempts actually made
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: ProviderError,
    /// True when the attempt ceiling was reached
    pub exhausted: bool,
}

impl RetryPolicy {
    /// Policy that never waits between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self, section: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config(format!("{}.max_attempts must be >= 1", section)));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::config(format!("{}.jitter must be in [0.0, 1.0]", section)));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(Error::config(format!("{}.attempt_timeout_ms must be > 0", section)));
        }
        Ok(())
    }

    /// Per-attempt timeout
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.base_delay_ms.saturating_mul(1u64 << exponent);
        let capped = base.min(self.max_delay_ms);

        let jittered = if self.jitter > 0.0 && capped > 0 {
            let spread = (capped as f64 * self.jitter) as i64;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped as i64 + offset).max(0) as u64
        } else {
            capped
        };

        let delay = Duration::from_millis(jittered);
        match retry_after {
            Some(hint) => delay.max(hint.min(Duration::from_millis(self.max_delay_ms))),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds, fails non-retryably, or the
    /// attempt ceiling is reached
    pub async fn run<F, Fut, T>(
        &self,
        name: &str,
        mut operation: F,
    ) -> std::result::Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match timeout(self.attempt_timeout(), operation(attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::warn!("{} failed with non-retryable error: {}", name, err);
                return Err(RetryFailure {
                    attempts: attempt,
                    last_error: err,
                    exhausted: false,
                });
            }

            if attempt >= max_attempts {
                tracing::warn!("{} failed after {} attempt(s): {}", name, attempt, err);
                return Err(RetryFailure {
                    attempts: attempt,
                    last_error: err,
                    exhausted: true,
                });
            }

            let delay = self.delay_for(attempt, err.retry_after());
            tracing::warn!(
                "{} failed (attempt {}/{}): {}, retrying in {:?}",
                name,
                attempt,
                max_attempts,
                err,
                delay
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 350,
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(350));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_millis(300))),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter: 0.5,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.delay_for(1, None).as_millis();
            assert!((500..=1500).contains(&delay));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("op", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::RateLimited { retry_after: None })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ceiling_is_not_exceeded() {
        let calls = AtomicU32::new(0);
        let failure = RetryPolicy::immediate(3)
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::Transient("503".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert!(failure.exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let failure = RetryPolicy::immediate(5)
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::Refused("policy".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(!failure.exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retryable() {
        let policy = RetryPolicy {
            attempt_timeout_ms: 50,
            ..RetryPolicy::immediate(2)
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        sleep(Duration::from_secs(10)).await;
                    }
                    Ok::<_, ProviderError>(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
