//! # Keyed Bucket Registry
//!
//! One token bucket per admission key, nested inside a single global bucket.
//!
//! ```text
//!     Two-Tier Admission:
//!
//!     admit("10.0.0.7")
//!          │
//!          ▼
//!     ┌──────────────┐   ❌   return false
//!     │ global bucket├──────► (per-key bucket untouched)
//!     └──────┬───────┘
//!            │ ✅ (global token spent)
//!            ▼
//!     ┌──────────────┐
//!     │  HashMap     │
//!     │  key → TB    │ ◄── created on first sight, full
//!     └──────┬───────┘
//!            ▼
//!     per-key try_consume() ──► result
//! ```
//!
//! ## Ordering
//!
//! The global bucket is asked first and the per-key bucket only if the global
//! one said yes. When the system is saturated, per-key quotas are therefore
//! left intact; when a single key is saturated, the global token for its
//! attempt is still spent even though the request is denied.
//!
//! ## Memory
//!
//! Keys are never forgotten unless idle eviction is configured. A long-running
//! limiter facing many distinct keys grows by one bucket per key.

use super::{config::LimiterConfig, core::TokenBucket, error::ConfigError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Per-key buckets plus the global bucket they share.
///
/// The registry is not synchronized; the composite limiter wraps it in its
/// single lock together with the admission queue.
#[derive(Debug)]
pub struct KeyedRegistry {
    /// Key → bucket. `ahash` keeps lookups cheap on the hot path.
    buckets: HashMap<String, TokenBucket, ahash::RandomState>,

    /// Bucket shared by every key.
    global: TokenBucket,

    /// Capacity given to every new per-key bucket.
    per_key_capacity: u64,

    /// Refill interval shared by the global and every per-key bucket.
    fill_interval: Duration,

    /// Per-key buckets created since startup.
    total_created: u64,

    /// Per-key buckets removed by idle eviction since startup.
    total_evicted: u64,
}

impl KeyedRegistry {
    /// Creates a registry with a full global bucket and no keys.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by `LimiterConfig::validate`.
    pub fn new(config: &LimiterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::prevalidated(config))
    }

    pub(crate) fn prevalidated(config: &LimiterConfig) -> Self {
        Self {
            buckets: HashMap::with_hasher(ahash::RandomState::new()),
            global: TokenBucket::prevalidated(
                config.global_capacity,
                config.fill_interval,
                Instant::now(),
            ),
            per_key_capacity: config.per_key_capacity,
            fill_interval: config.fill_interval,
            total_created: 0,
            total_evicted: 0,
        }
    }

    /// Two-tier admission check for `key`.
    ///
    /// The per-key bucket is created (full) if this is the first time `key`
    /// is seen, even when the global bucket then denies.
    pub fn admit(&mut self, key: &str) -> bool {
        let now = Instant::now();

        if let Some(bucket) = self.buckets.get_mut(key) {
            return self.global.try_consume_at(now) && bucket.try_consume_at(now);
        }

        let mut bucket = TokenBucket::prevalidated(self.per_key_capacity, self.fill_interval, now);
        let admitted = self.global.try_consume_at(now) && bucket.try_consume_at(now);

        self.buckets.insert(key.to_owned(), bucket);
        self.total_created += 1;
        debug!(key, tracked = self.buckets.len(), "created bucket for new key");

        admitted
    }

    /// Takes one token from the global bucket only.
    ///
    /// This is the sole gate for releasing callers from the admission queue.
    #[inline]
    pub fn admit_global(&mut self) -> bool {
        self.global.try_consume()
    }

    /// Removes per-key buckets not consumed from for longer than `ttl`.
    ///
    /// Returns the number of keys removed.
    pub fn evict_idle(&mut self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();

        self.buckets.retain(|key, bucket| {
            let idle = bucket.is_idle(now, ttl);
            if idle {
                debug!(key = key.as_str(), "evicting idle key");
            }
            !idle
        });

        let removed = before - self.buckets.len();
        if removed > 0 {
            self.total_evicted += removed as u64;
            info!(removed, remaining = self.buckets.len(), "evicted idle keys");
        }
        removed
    }

    /// Tokens currently available to `key`, or `None` if the key is unknown.
    pub fn available(&self, key: &str) -> Option<u64> {
        self.buckets.get(key).map(TokenBucket::available)
    }

    /// Tokens currently available in the global bucket.
    pub fn global_available(&self) -> u64 {
        self.global.available()
    }

    /// Capacity of the global bucket.
    #[inline]
    pub fn global_capacity(&self) -> u64 {
        self.global.capacity()
    }

    /// Number of keys currently tracked.
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no key has a bucket.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Per-key buckets created since startup.
    #[inline]
    pub fn total_created(&self) -> u64 {
        self.total_created
    }

    /// Per-key buckets evicted since startup.
    #[inline]
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }
}
