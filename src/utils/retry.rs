// Retry utilities - Bounded attempts with exponential backoff
//
// `retries` counts total attempts, not re-tries after the first one. Only
// errors classified retryable (dial timeout, refused, reset) consume another
// attempt; anything else ends the loop immediately.

use crate::error::ProbeError;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and backoff curve for a single target.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub max_attempts: usize,

    /// Pause before the second attempt; doubled for each further attempt
    pub initial_backoff: Duration,

    /// Ceiling for the doubled backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::DEFAULT_RETRIES,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// A single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff to wait after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let scaled = self.initial_backoff.saturating_mul(1u32 << shift);
        scaled.min(self.max_backoff)
    }
}

/// Outcome of a retried operation, with the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProbeError>,
    pub attempts: usize,
    /// The final error was retryable and the budget ran out
    pub exhausted: bool,
}

/// Run `operation` until it succeeds, fails terminally, or the budget is used up.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("Operation succeeded on attempt {}", attempt);
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    exhausted: false,
                };
            }
            Err(e) if !e.is_retryable() => {
                tracing::debug!("Non-retryable error on attempt {}: {}", attempt, e);
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                    exhausted: false,
                };
            }
            Err(e) if attempt >= max_attempts => {
                tracing::debug!("All {} attempts failed, last error: {}", max_attempts, e);
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                    exhausted: true,
                };
            }
            Err(e) => {
                let backoff = policy.backoff_for(attempt);
                tracing::debug!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timeout_err() -> ProbeError {
        ProbeError::new(ProbeErrorKind::DialTimeout, "timed out")
    }

    #[test]
    fn test_backoff_curve_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();

        let outcome = retry_with_backoff(&policy, |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 { Err(timeout_err()) } else { Ok(attempt) }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_reported() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(10));
        let outcome: RetryOutcome<()> =
            retry_with_backoff(&policy, |_| async { Err(timeout_err()) }).await;

        assert!(outcome.exhausted);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60));
        let outcome: RetryOutcome<()> = retry_with_backoff(&policy, |_| async {
            Err(ProbeError::resolution("nx.example", "NXDOMAIN"))
        })
        .await;

        assert!(!outcome.exhausted);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap_err().kind, ProbeErrorKind::Resolution);
    }
}
