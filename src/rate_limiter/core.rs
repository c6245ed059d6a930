//! # Token Bucket
//!
//! The single-counter limiter both tiers of the composite limiter are built
//! from. A bucket holds up to `capacity` tokens and gains one token every
//! `fill_interval`. There is no background timer: refill is computed lazily
//! from the time elapsed since the last refill whenever a token is requested.
//!
//! ```text
//!     try_consume() at t = 2.7 × fill_interval since last refill:
//!
//!     elapsed / fill_interval = 2   (integer division)
//!     tokens = min(capacity, tokens + 2)
//!     last_refill = now             (the 0.7 remainder is dropped)
//!
//!     tokens > 0 ? tokens -= 1, ✅ : ❌
//! ```
//!
//! Moving `last_refill` to `now` instead of `last_refill + 2 × fill_interval`
//! discards the sub-interval remainder, so a bucket polled often enough
//! refills a little slower than `1 / fill_interval`. Admission decisions in
//! deployed systems depend on this cadence, so it is kept as is.
//!
//! A bucket is plain data. It is not internally synchronized; the composite
//! limiter only touches buckets while holding its own lock.

use super::error::ConfigError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Counter-based token bucket with discretized lazy refill.
///
/// # Example
///
/// ```rust
/// use admitter::TokenBucket;
/// use std::time::Duration;
///
/// let mut bucket = TokenBucket::new(3, Duration::from_secs(1)).unwrap();
///
/// assert!(bucket.try_consume());
/// assert!(bucket.try_consume());
/// assert!(bucket.try_consume());
/// assert!(!bucket.try_consume()); // empty until a full second has passed
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold.
    capacity: u64,

    /// Tokens available right now. Always `<= capacity`.
    tokens: u64,

    /// Time needed to add one token.
    fill_interval: Duration,

    /// Instant of the last refill. Never moves backwards.
    last_refill: Instant,

    /// Instant of the last `try_consume` call, for idle-key eviction.
    pub(crate) last_access: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] or [`ConfigError::ZeroFillInterval`]
    /// if either argument is zero.
    pub fn new(capacity: u64, fill_interval: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if fill_interval.is_zero() {
            return Err(ConfigError::ZeroFillInterval);
        }
        Ok(Self::prevalidated(capacity, fill_interval, Instant::now()))
    }

    /// Builds a bucket from values a validated `LimiterConfig` already vouched for.
    pub(crate) fn prevalidated(capacity: u64, fill_interval: Duration, now: Instant) -> Self {
        debug_assert!(capacity > 0 && !fill_interval.is_zero());
        Self {
            capacity,
            tokens: capacity,
            fill_interval,
            last_refill: now,
            last_access: now,
        }
    }

    /// Takes one token if one is available, refilling first.
    ///
    /// # Returns
    ///
    /// - `true` if a token was taken (admitted)
    /// - `false` if the bucket is empty; only the refill is applied
    #[inline]
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(Instant::now())
    }

    pub(crate) fn try_consume_at(&mut self, now: Instant) -> bool {
        self.last_access = now;
        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Adds one token per whole `fill_interval` elapsed since the last refill.
    #[inline]
    fn refill(&mut self, now: Instant) {
        // A caller holding an older `now` than the last refill adds nothing
        let elapsed = now.saturating_duration_since(self.last_refill);
        let periods = elapsed.as_nanos() / self.fill_interval.as_nanos();
        if periods == 0 {
            return;
        }

        let to_add = u64::try_from(periods).unwrap_or(u64::MAX);
        let before = self.tokens;
        self.tokens = self.tokens.saturating_add(to_add).min(self.capacity);
        self.last_refill = now;
        trace!(periods = to_add, added = self.tokens - before, "bucket refilled");
    }

    /// Tokens a call made now would find, including any pending refill.
    ///
    /// Does not apply the refill, so observing a bucket never shifts its
    /// refill cadence.
    pub fn available(&self) -> u64 {
        self.available_at(Instant::now())
    }

    pub(crate) fn available_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let periods = elapsed.as_nanos() / self.fill_interval.as_nanos();
        let pending = u64::try_from(periods).unwrap_or(u64::MAX);
        self.tokens.saturating_add(pending).min(self.capacity)
    }

    /// Tokens held at the last refill or consume, without refilling.
    #[inline]
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Maximum number of tokens this bucket can hold.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Time needed to add one token.
    #[inline]
    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    /// Returns `true` if the bucket has not been consumed from for longer than `ttl`.
    pub(crate) fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_access) > ttl
    }
}
