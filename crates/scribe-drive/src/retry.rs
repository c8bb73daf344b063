//! Bounded retry with exponential backoff and jitter.
//!
//! Transient provider failures (network, rate limit, 5xx) are retried a
//! fixed number of times with doubling delays and a random jitter, capped
//! on total sleep time as well as attempt count. Exhausting the budget
//! surfaces as `StorageUnavailable`; non-retryable errors pass through
//! untouched on the first failure.

use std::time::Duration;

use rand::Rng as _;
use tracing::warn;

use crate::error::{DriveError, DriveResult};

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Cap on the total time spent sleeping between retries.
    pub max_total_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_total_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay before retry number `attempt` (0-based),
    /// with up to half the base delay of random jitter added.
    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay * 2u32.saturating_pow(attempt);
        let jitter_cap = (self.base_delay / 2).as_millis() as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// Runs `operation` under the given retry policy.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    name: &str,
    mut operation: F,
) -> DriveResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriveResult<T>>,
{
    let mut slept = Duration::ZERO;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                let remaining = policy.max_attempts - attempt - 1;
                if remaining == 0 {
                    return Err(DriveError::storage_unavailable(format!(
                        "{} failed after {} attempts: {}",
                        name, policy.max_attempts, e
                    )));
                }

                let delay = policy.delay_for(attempt);
                if slept + delay > policy.max_total_delay {
                    return Err(DriveError::storage_unavailable(format!(
                        "{} exceeded the retry time budget: {}",
                        name, e
                    )));
                }

                warn!(
                    "{} attempt {} failed ({}), retrying in {:?}",
                    name,
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                slept += delay;
            }
        }
    }

    // max_attempts is validated non-zero by construction; the loop always
    // returns before falling through.
    Err(DriveError::internal(format!("{} retry loop exhausted", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_total_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn delay_doubles_with_bounded_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_total_delay: Duration::from_secs(10),
        };

        for attempt in 0..3 {
            let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
            let delay = policy.delay_for(attempt);
            assert!(delay >= backoff, "attempt {attempt}: {delay:?} < {backoff:?}");
            assert!(
                delay <= backoff + Duration::from_millis(50),
                "attempt {attempt}: {delay:?} jitter out of range"
            );
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let result = with_retry(&quick_policy(), "op", || async { Ok::<_, DriveError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: DriveResult<()> = with_retry(&quick_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DriveError::not_found("gone")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick_policy(), "op", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(DriveError::network("flaky"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_storage_unavailable() {
        let calls = AtomicU32::new(0);
        let result: DriveResult<()> = with_retry(&quick_policy(), "download", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DriveError::server("still down")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(err.message().contains("download"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_caps_total_retries() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_total_delay: Duration::from_millis(150),
        };

        let calls = AtomicU32::new(0);
        let result: DriveResult<()> = with_retry(&policy, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DriveError::network("down")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::StorageUnavailable);
        // First retry sleeps ~100ms, second would blow the 150ms budget.
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }
}
