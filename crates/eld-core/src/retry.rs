//! Retry-with-backoff wrapper. A higher-order helper wrapping any
//! fallible async operation; used by the chain appender to retry the
//! scope-serialized append transaction and, more generally, anywhere a
//! transient store error should be absorbed before it reaches the caller.
//! Logs at `info` on eventual recovery and `warn` on exhaustion.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// `delay = min(base * 2^(n-1), max) + uniform(0, min(base/2, 500ms))`,
/// for attempt `n` (1-indexed, the attempt that just failed).
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let exp_delay = policy
        .base_delay
        .checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
        .unwrap_or(policy.max_delay)
        .min(policy.max_delay);
    let jitter_cap = (policy.base_delay / 2).min(Duration::from_millis(500));
    let jitter_ms = if jitter_cap.is_zero() {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_cap.as_millis() as u64)
    };
    exp_delay + Duration::from_millis(jitter_ms)
}

/// Run `op` under the retry policy, classifying errors with `is_transient`.
/// Non-transient errors propagate immediately; transient errors are
/// retried with backoff until `max_attempts` is reached.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(context, attempt, "operation recovered after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    tracing::warn!(context, attempt, "retries exhausted, propagating last error");
                    return Err(err);
                }
                let delay = backoff_delay(policy, attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Default transient classifier for database-layer errors, delegating to
/// `DbError::is_transient`.
pub fn db_error_is_transient(err: &eld_db::DbError) -> bool {
    err.is_transient()
}

/// Transient classifier for pipeline-level errors. Used where an
/// operation can fail for reasons other than a bare `DbError` (e.g. a
/// sequence collision mapped to `IngestError::Validation`) but only the
/// wrapped database error should ever be retried.
pub fn ingest_error_is_transient(err: &crate::error::IngestError) -> bool {
    matches!(err, crate::error::IngestError::Database(db) if db.is_transient())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_delay_follows_exponential_schedule_within_jitter() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        let d1 = backoff_delay(&policy, 1);
        let d2 = backoff_delay(&policy, 2);
        let d3 = backoff_delay(&policy, 3);
        assert!(d1 >= Duration::from_secs(1) && d1 <= Duration::from_millis(1_500));
        assert!(d2 >= Duration::from_secs(2) && d2 <= Duration::from_millis(2_500));
        assert!(d3 >= Duration::from_secs(4) && d3 <= Duration::from_millis(4_500));
    }

    #[test]
    fn backoff_delay_caps_at_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        let d = backoff_delay(&policy, 8);
        assert!(d <= Duration::from_millis(30_500));
    }

    #[tokio::test]
    async fn non_transient_error_propagates_immediately() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), &str> = retry(&policy, "test", |_e: &&str| false, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("non-transient")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_error_retries_until_success() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<&str, &str> = retry(&policy, "test", |_e: &&str| true, move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("transient")
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_error_exhausts_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), &str> = retry(&policy, "test", |_e: &&str| true, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("always-transient")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
