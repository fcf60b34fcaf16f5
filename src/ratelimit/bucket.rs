//! Token bucket implementation.

use tokio::time::Instant;

/// A continuously refilling token bucket.
///
/// The bucket holds up to `capacity` tokens and gains `rate` tokens per
/// second. Each admitted operation consumes one token. The bucket itself is
/// not synchronized; callers serialize access through the entry store.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Tokens currently available, always within `[0, capacity]`
    tokens: f64,
    /// Tokens added per second
    rate: f64,
    /// Maximum number of tokens (the burst size)
    capacity: f64,
    /// When tokens were last added
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(rate: f64, capacity: u32) -> Self {
        Self::new_at(rate, capacity, Instant::now())
    }

    /// Create a full bucket as of `now`.
    pub fn new_at(rate: f64, capacity: u32, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            tokens: capacity,
            rate,
            capacity,
            last_refill: now,
        }
    }

    /// Try to take one token right now.
    ///
    /// Returns `true` if a token was consumed, `false` if the bucket is empty.
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(Instant::now())
    }

    /// Try to take one token as of `now`.
    pub fn try_consume_at(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens that would be available at `now`, without touching the bucket.
    pub fn available_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity)
    }

    /// Get the refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Get the capacity of this bucket.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self, now: Instant) {
        // A clock that steps backwards adds nothing and keeps the later mark.
        if now <= self.last_refill {
            return;
        }
        self.tokens = self.available_at(now);
        self.last_refill = now;
    }
}
