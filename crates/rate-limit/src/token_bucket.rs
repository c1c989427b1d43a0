use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// A single token bucket.
///
/// The bucket holds up to `burst` tokens and refills continuously at `rate`
/// tokens per second. Every allowed request consumes exactly one token. A new
/// bucket starts full.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: f64,
}

impl TokenBucket {
    /// * `rps`   - sustained requests per second (refill rate)
    /// * `burst` - maximum burst size (bucket capacity)
    pub fn new(rps: f64, burst: u32) -> Self {
        Self::new_at(rps, burst, Instant::now())
    }

    pub fn new_at(rps: f64, burst: u32, now: Instant) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            tokens: burst,
            last_refill: now,
            rate: rps.max(0.0),
            burst,
        }
    }

    pub fn try_take(&mut self) -> bool {
        self.try_take_at(Instant::now())
    }

    /// Refill for the time elapsed since the last call, then try to consume
    /// one token.
    pub fn try_take_at(&mut self, now: Instant) -> bool {
        // saturating: callers may pass instants slightly older than last_refill
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, without refilling.
    pub fn available(&self) -> f64 {
        self.tokens
    }
}

/// One bucket shared by every caller, used for the global webhook limit.
#[derive(Debug)]
pub struct GlobalLimiter {
    bucket: Mutex<TokenBucket>,
}

impl GlobalLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        tracing::info!(rps, burst, "creating global token bucket");
        Self {
            bucket: Mutex::new(TokenBucket::new(rps, burst)),
        }
    }

    pub fn allow(&self) -> bool {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn allows_up_to_burst() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new_at(10.0, 5, now);

        for _ in 0..5 {
            assert!(bucket.try_take_at(now), "should allow within burst");
        }

        assert!(!bucket.try_take_at(now), "should deny beyond burst");
    }

    #[test]
    fn refills_over_time() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new_at(10.0, 5, start);

        for _ in 0..5 {
            bucket.try_take_at(start);
        }
        assert!(!bucket.try_take_at(start));

        // 150ms at 10 rps = 1.5 tokens
        let later = start + Duration::from_millis(150);
        assert!(bucket.try_take_at(later), "should allow after refill");
        assert!(!bucket.try_take_at(later));
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new_at(100.0, 3, start);
        bucket.try_take_at(start);

        let much_later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(bucket.try_take_at(much_later));
        }
        assert!(!bucket.try_take_at(much_later));
    }

    #[test]
    fn zero_burst_is_treated_as_one() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new_at(1.0, 0, now);
        assert!(bucket.try_take_at(now));
        assert!(!bucket.try_take_at(now));
    }

    #[test]
    fn global_limiter_is_shared() {
        let limiter = GlobalLimiter::new(0.001, 2);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
