//! Rate limiting utilities

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Messages per second a feed subscriber may send
pub const WS_MESSAGE_RATE_LIMIT: u32 = 5;

/// Build a quota allowing `burst` attempts at once, refilled one per `refill`
pub fn burst_quota(burst: u32, refill: Duration) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(refill)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

/// Per-order limiter for OTP verification attempts
///
/// Each order gets its own bucket the first time it is checked. Buckets are
/// dropped once the order is completed.
#[derive(Clone)]
pub struct OtpAttemptLimiter {
    quota: Quota,
    limiters: Arc<DashMap<Uuid, Arc<Limiter>>>,
}

impl OtpAttemptLimiter {
    pub fn new(max_attempts: u32, refill: Duration) -> Self {
        Self {
            quota: burst_quota(max_attempts, refill),
            limiters: Arc::new(DashMap::new()),
        }
    }

    /// Check if another attempt is allowed for this order (returns true if allowed)
    pub fn check(&self, order_id: Uuid) -> bool {
        let limiter = self
            .limiters
            .entry(order_id)
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone();
        limiter.check().is_ok()
    }

    /// Drop the bucket of an order
    pub fn forget(&self, order_id: Uuid) {
        self.limiters.remove(&order_id);
    }

    /// Number of orders currently tracked
    pub fn tracked(&self) -> usize {
        self.limiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_exhausted_per_order() {
        let limiter = OtpAttemptLimiter::new(2, Duration::from_secs(60));
        let order = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(limiter.check(order));
        assert!(limiter.check(order));
        assert!(!limiter.check(order));

        // Another order has its own bucket
        assert!(limiter.check(other));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn forget_resets_the_bucket() {
        let limiter = OtpAttemptLimiter::new(1, Duration::from_secs(60));
        let order = Uuid::new_v4();

        assert!(limiter.check(order));
        assert!(!limiter.check(order));

        limiter.forget(order);
        assert_eq!(limiter.tracked(), 0);
        assert!(limiter.check(order));
    }
}
