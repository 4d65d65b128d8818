//! Token-bucket rate limiter and exponential backoff (C1)
//!
//! Every external-API call path (note source, embedding, chat) acquires a
//! token before the request and retries failures through `Backoff`.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket with `rate` tokens/sec refill and capacity `rate`.
///
/// `acquire()` suspends the caller until at least one token is available.
/// Mutex acquisition during refill is bounded to 5s — a stuck refill fails
/// the request rather than blocking the caller forever.
pub struct RateLimiter {
    rate: f64,
    inner: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

#[derive(Debug, thiserror::Error)]
#[error("rate limiter lock acquisition timed out after 5s")]
pub struct RateLimiterTimeout;

impl RateLimiter {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            inner: Mutex::new(BucketState {
                tokens: rate,
                last_update: Instant::now(),
            }),
        }
    }

    /// Acquire one token, waiting for refill if necessary. Fails if the
    /// internal mutex cannot be acquired within 5 seconds.
    pub async fn acquire(&self) -> Result<(), RateLimiterTimeout> {
        let mut guard = tokio::time::timeout(Duration::from_secs(5), self.inner.lock())
            .await
            .map_err(|_| RateLimiterTimeout)?;

        Self::refill(&mut guard, self.rate);

        if guard.tokens < 1.0 {
            let deficit = 1.0 - guard.tokens;
            let sleep_secs = deficit / self.rate;
            tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
            Self::refill(&mut guard, self.rate);
        }

        guard.tokens -= 1.0;
        Ok(())
    }

    fn refill(state: &mut BucketState, rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate).min(rate);
        state.last_update = now;
    }
}

/// Exponential backoff: `delay(attempt) = min(base * mult^attempt, max)`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.base.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }

    pub async fn sleep(&self, attempt: u32) {
        tokio::time::sleep(self.delay(attempt)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn acquire_drains_and_refills_tokens() {
        let limiter = RateLimiter::new(1000.0);
        for _ in 0..10 {
            limiter.acquire().await.expect("should acquire");
        }
    }

    #[tokio::test]
    async fn acquire_waits_when_bucket_empty() {
        let limiter = RateLimiter::new(100.0);
        // Drain the bucket.
        for _ in 0..100 {
            limiter.acquire().await.expect("should acquire");
        }
        let start = Instant::now();
        limiter.acquire().await.expect("should acquire after waiting");
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
