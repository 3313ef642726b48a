// src/fetch/rate_limit.rs
// =============================================================================
// Process-wide request quota.
//
// A token bucket (GCRA via `governor`) allowing N requests per second. The
// limiter lives behind an Arc: cloning it hands out another handle to the SAME
// bucket, so every fetcher built from one limiter shares the quota, even
// across crawl jobs running at the same time. governor's accounting is
// lock-free and atomic.
// =============================================================================

use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;

#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_second: u32,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

impl RateLimiter {
    /// A zero quota is bumped to 1 request per second.
    pub fn per_second(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(rps))),
            requests_per_second: rps.get(),
        }
    }

    /// Suspends until the bucket has a token for one more request.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_second(crate::config::DEFAULT_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_burst_within_quota_is_immediate() {
        let limiter = RateLimiter::per_second(10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_clones_share_the_quota() {
        let limiter = RateLimiter::per_second(2);
        let other = limiter.clone();

        let start = Instant::now();
        limiter.acquire().await;
        other.acquire().await;
        // bucket is empty now; the third request has to wait for a refill
        limiter.acquire().await;

        assert!(
            start.elapsed() >= Duration::from_millis(300),
            "Rate limiting not shared: {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_zero_quota_is_bumped() {
        assert_eq!(RateLimiter::per_second(0).requests_per_second(), 1);
    }
}
