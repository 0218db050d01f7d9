//! Sliding-window rate limiter
//!
//! Keeps, per identifier (a client IP for the login endpoint), the instants of
//! the requests admitted during the last window. At most `max_requests` are
//! admitted per window; rejected requests are not recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Per-identifier sliding-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Arc<RwLock<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or reject one request from `identifier`.
    pub async fn check(&self, identifier: &str) -> bool {
        self.check_at(identifier, Instant::now()).await
    }

    pub async fn check_at(&self, identifier: &str, now: Instant) -> bool {
        let mut requests = self.requests.write().await;
        let queue = requests.entry(identifier.to_string()).or_default();
        Self::evict(queue, now, self.window);

        if queue.len() < self.max_requests {
            queue.push_back(now);
            true
        } else {
            false
        }
    }

    /// Seconds until `identifier` may be admitted again (0 if it may now).
    pub async fn retry_after(&self, identifier: &str) -> u64 {
        self.retry_after_at(identifier, Instant::now()).await
    }

    pub async fn retry_after_at(&self, identifier: &str, now: Instant) -> u64 {
        let requests = self.requests.read().await;
        let Some(queue) = requests.get(identifier) else {
            return 0;
        };
        let live = queue
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count();
        if live < self.max_requests {
            return 0;
        }
        // The oldest live entry is the next to leave the window
        queue
            .iter()
            .find(|t| now.saturating_duration_since(**t) < self.window)
            .map(|oldest| {
                let remaining = self.window - now.saturating_duration_since(*oldest);
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            })
            .unwrap_or(0)
    }

    /// Drop stale entries and identifiers with nothing left in the window.
    pub async fn cleanup(&self) {
        self.cleanup_at(Instant::now()).await;
    }

    pub async fn cleanup_at(&self, now: Instant) {
        let mut requests = self.requests.write().await;
        requests.retain(|_, queue| {
            Self::evict(queue, now, self.window);
            !queue.is_empty()
        });
    }

    /// Number of identifiers currently tracked
    pub async fn tracked(&self) -> usize {
        self.requests.read().await.len()
    }

    fn evict(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = queue.front() {
            if now.saturating_duration_since(*front) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_exactly_max_requests() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at("1.2.3.4", now).await);
        }
        assert!(!limiter.check_at("1.2.3.4", now).await);
        assert!(!limiter.check_at("1.2.3.4", now).await);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now).await);
        assert!(!limiter.check_at("a", now).await);
        assert!(limiter.check_at("b", now).await);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("ip", start).await);
        assert!(limiter.check_at("ip", start + Duration::from_secs(5)).await);
        assert!(!limiter.check_at("ip", start + Duration::from_secs(9)).await);

        // The first request has left the window, the second has not
        assert!(limiter.check_at("ip", start + Duration::from_secs(10)).await);
        assert!(!limiter.check_at("ip", start + Duration::from_secs(11)).await);
    }

    #[tokio::test]
    async fn test_retry_after() {
        let limiter = RateLimiter::new(1, Duration::from_secs(30));
        let start = Instant::now();

        assert_eq!(limiter.retry_after_at("ip", start).await, 0);
        limiter.check_at("ip", start).await;
        assert_eq!(limiter.retry_after_at("ip", start + Duration::from_secs(10)).await, 20);
        assert_eq!(limiter.retry_after_at("ip", start + Duration::from_secs(30)).await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_identifiers() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();
        limiter.check_at("old", start).await;
        limiter.check_at("new", start + Duration::from_secs(8)).await;

        limiter.cleanup_at(start + Duration::from_secs(12)).await;
        assert_eq!(limiter.tracked().await, 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Within one window exactly `max` of any burst are admitted.
            #[test]
            fn prop_burst_admits_exactly_max(max in 1usize..20, burst in 0usize..50) {
                let admitted = tokio_test::block_on(async {
                    let limiter = RateLimiter::new(max, Duration::from_secs(60));
                    let now = Instant::now();
                    let mut admitted = 0;
                    for _ in 0..burst {
                        if limiter.check_at("client", now).await {
                            admitted += 1;
                        }
                    }
                    admitted
                });
                prop_assert_eq!(admitted, burst.min(max));
            }

            /// After a full window the identifier is admitted again.
            #[test]
            fn prop_admitted_after_window(max in 1usize..10, window_secs in 1u64..600) {
                let allowed = tokio_test::block_on(async {
                    let window = Duration::from_secs(window_secs);
                    let limiter = RateLimiter::new(max, window);
                    let now = Instant::now();
                    for _ in 0..max {
                        limiter.check_at("client", now).await;
                    }
                    let blocked = !limiter.check_at("client", now).await;
                    blocked && limiter.check_at("client", now + window).await
                });
                prop_assert!(allowed);
            }
        }
    }
}
