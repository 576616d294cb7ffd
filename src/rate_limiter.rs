use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Admission gate that spaces outbound provider requests by at least
/// `min_interval`. One instance is shared by every client in the process.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_permitted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permitted: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the caller may issue a request. The gate stays held while
    /// sleeping so concurrent callers cannot compute overlapping windows.
    pub async fn acquire(&self) {
        let mut last_permitted = self.last_permitted.lock().await;
        if let Some(previous) = *last_permitted {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Throttling price request for {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }
        *last_permitted = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_admitted_immediately() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let started = Instant::now();
        limiter.acquire().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let started = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_the_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        limiter.acquire().await;
        sleep(Duration::from_millis(1500)).await;
        let started = Instant::now();
        limiter.acquire().await;
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_gate() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2)));
        let started = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();
        for pair in admitted.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_limiters_do_not_interact() {
        let first = RateLimiter::new(Duration::from_secs(2));
        let second = RateLimiter::new(Duration::from_secs(2));
        let started = Instant::now();
        first.acquire().await;
        second.acquire().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
