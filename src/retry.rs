use crate::error::FetchError;
use log::warn;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Result of one attempt: either a usable value or a rate-limit rejection.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    RateLimited,
}

/// Runs `operation` until it stops being rate limited, sleeping with
/// exponential backoff in between. Errors from the operation are returned
/// on first occurrence; only `Attempt::RateLimited` is retried.
pub async fn retry_rate_limited<T, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>, FetchError>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut retry = 0u32;

    loop {
        match operation().await? {
            Attempt::Done(value) => break Ok(value),
            Attempt::RateLimited if retry >= policy.max_retries => {
                warn!(
                    "Giving up on {} after {} rate-limited attempts",
                    context, max_attempts
                );
                break Err(FetchError::RateLimited {
                    attempts: max_attempts,
                });
            }
            Attempt::RateLimited => {
                let delay = policy.delay_for(retry);
                warn!(
                    "Attempt {}/{} for {} was rate limited. Retrying in {}ms.",
                    retry + 1,
                    max_attempts,
                    context,
                    delay.as_millis()
                );
                sleep(delay).await;
                retry += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500).saturating_mul(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_rate_limits_within_bound() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let value = retry_rate_limited(&policy, "test", || {
            calls.set(calls.get() + 1);
            let call = calls.get();
            async move {
                if call <= 3 {
                    Ok(Attempt::RateLimited)
                } else {
                    Ok(Attempt::Done(call))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 4);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bound_is_exceeded() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Cell::new(0u32);

        let err = retry_rate_limited(&policy, "test", || {
            calls.set(calls.get() + 1);
            async { Ok::<Attempt<()>, FetchError>(Attempt::RateLimited) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::RateLimited { attempts: 4 }));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let err = retry_rate_limited(&policy, "test", || {
            calls.set(calls.get() + 1);
            async { Err::<Attempt<()>, _>(FetchError::Transport("connection reset".into())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(calls.get(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
