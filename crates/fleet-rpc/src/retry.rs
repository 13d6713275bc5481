//! A single reusable retry policy every RPC client call goes through.

use fleet_error::{ErrorCode, FleetError};
use std::future::Future;
use std::time::{Duration, Instant};

/// Bounded retry budget. Only [`FleetError::is_retryable`] errors are
/// retried; everything else (validation, auth, not-found, conflict)
/// propagates on the first attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Delay before attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt numbered `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, the
    /// attempt budget runs out, or `deadline` passes.
    ///
    /// The deadline is checked before every attempt rather than threaded
    /// through the call itself, since nothing in this dependency stack
    /// provides cooperative per-await cancellation.
    pub async fn run<F, Fut, T>(&self, deadline: Option<Instant>, mut call: F) -> Result<T, FleetError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FleetError>>,
    {
        let mut attempt = 1;
        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(FleetError::new(ErrorCode::Cancelled, "deadline exceeded"));
                }
            }
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
        };
        let attempts = AtomicU32::new(0);
        let result = policy
            .run(None, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FleetError::new(ErrorCode::Unavailable, "not yet"))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn never_retries_non_transient() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let err = policy
            .run(None, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FleetError::new(ErrorCode::InvalidArgument, "bad request"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let attempts = AtomicU32::new(0);
        let err = policy
            .run(None, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FleetError::new(ErrorCode::Unavailable, "down"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unavailable);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
