//! Retry policy applied around every backend command.
//!
//! The default policy keeps the historical behaviour of the cache layer:
//! on a transient failure, log, wait 30 seconds, and try again with no
//! upper bound. Callers that prefer failing fast configure a bounded policy
//! or hand a [`CancellationToken`] to the client.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{Error, Result};

/// Interval between attempts when nothing else is configured. Long on
/// purpose: during a failover or node restart it keeps log volume down.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(30);

/// Decides how long to wait before the next attempt.
pub trait Backoff: fmt::Debug + Send + Sync {
    /// Delay after the `attempt`-th failure (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same delay after every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling delay, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: Arc<dyn Backoff>,
    max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    /// Retries forever with a fixed delay.
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            backoff: Arc::new(FixedBackoff(backoff)),
            max_attempts: None,
        }
    }

    /// Gives up after `max_attempts` attempts (at least one is always made).
    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            backoff: Arc::new(FixedBackoff(backoff)),
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Replaces the delay strategy.
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// The attempt limit, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, the
    /// attempt limit is reached, or `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    r = op() => r,
                },
                None => op().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            if self.max_attempts.is_some_and(|max| attempt >= max) {
                warn!(command = name, attempt, error = %err, "giving up");
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay(attempt);
            warn!(
                command = name,
                attempt,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "command failed, will retry"
            );

            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                },
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: &AtomicU32) -> Result<&'static str> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Err(Error::protocol("connection reset"))
        } else {
            Ok("done")
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), None);
        assert_eq!(policy.delay(1), Duration::from_secs(30));
        assert_eq!(policy.delay(50), Duration::from_secs(30));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = ExponentialBackoff {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
        assert_eq!(backoff.delay(200), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success_and_waits_per_failure() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("GET", None, || async { flaky(3, &calls) })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_gives_up() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::bounded(2, Duration::from_secs(1))
            .run("GET", None, || async { flaky(10, &calls) })
            .await;

        match result {
            Err(Error::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, Error::Protocol { .. }));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::default()
            .run("INCR", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Server {
                    message: "ERR value is not an integer".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(Error::Server { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            canceller.cancel();
        });

        let result = RetryPolicy::default()
            .run("GET", Some(&token), || async { flaky(u32::MAX, &calls) })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
