use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing between upstream call initiations.
///
/// The check and the timestamp update happen under one async mutex, and the
/// mutex is held across the wait, so concurrent callers queue behind each other
/// and each is granted its slot at least `min_interval` after the previous one.
/// Dropping an `acquire()` future mid-wait releases the mutex and leaves the
/// timestamp untouched.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call may be dispatched. Returns the instant the slot was granted.
    pub async fn acquire(&self) -> Instant {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = Instant::now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                log::debug!("Rate limiter holding call for {}ms", wait.as_millis());
                tokio::time::sleep(wait).await;
            }
        }

        let granted = Instant::now();
        *last_call = Some(granted);
        granted
    }

    /// Instant of the most recently granted slot
    pub async fn last_granted(&self) -> Option<Instant> {
        *self.last_call.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        let granted = limiter.acquire().await;
        assert_eq!(granted, start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_remaining_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(1500));
        let first = limiter.acquire().await;

        tokio::time::advance(Duration::from_millis(500)).await;
        let second = limiter.acquire().await;

        assert_eq!(second - first, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_once_interval_elapsed() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(3)).await;
        let before = Instant::now();
        let granted = limiter.acquire().await;
        assert_eq!(granted, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_spaced() {
        let interval = Duration::from_millis(250);
        let limiter = Arc::new(RateLimiter::new(interval));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();

        let mut granted = Vec::new();
        for handle in handles {
            granted.push(handle.await.unwrap());
        }
        granted.sort();

        for pair in granted.windows(2) {
            assert!(
                pair[1] - pair[0] >= interval,
                "slots granted {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_does_not_advance_timestamp() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(10)));
        let first = limiter.acquire().await;

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::time::advance(Duration::from_secs(1)).await;
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        // Lock was released and the slot was never granted
        assert_eq!(limiter.last_granted().await, Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, start);
        }
    }
}
