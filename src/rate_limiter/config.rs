//! # Limiter Configuration
//!
//! This module holds the settings consumed when a composite limiter is built.
//! The limiter never reads environment variables or files itself: whoever
//! embeds it (an HTTP middleware, a gRPC interceptor, ...) fills in a
//! [`LimiterConfig`] and hands it over.
//!
//! ## Key Concepts
//!
//! ```text
//!     Two-Tier Configuration:
//!
//!     ┌──────────────────────────────────┐
//!     │   Global bucket                  │ ← global_capacity
//!     │   ┌────────┐ ┌────────┐          │
//!     │   │ key A  │ │ key B  │  ...     │ ← per_key_capacity each
//!     │   └────────┘ └────────┘          │
//!     │                                  │
//!     │   fill_interval: 1 token / tick  │ ← shared by every bucket
//!     │   queue_timeout: 5s              │ ← max wait for deferred callers
//!     └──────────────────────────────────┘
//! ```
//!
//! `fill_interval` is the time it takes to add **one** token to a bucket,
//! not the time to refill it completely.

use super::error::ConfigError;
use std::time::Duration;

/// How long a deferred caller waits in the admission queue before giving up.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between idle-key sweeps when eviction is enabled.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`CompositeLimiter`](super::CompositeLimiter).
///
/// ## Examples
///
/// ```rust
/// use admitter::LimiterConfig;
/// use std::time::Duration;
///
/// // 10 requests per key, 100 overall, one token added every 100ms
/// let config = LimiterConfig::new(10, 100, Duration::from_millis(100));
/// assert!(config.validate().is_ok());
///
/// // Evict keys that have been quiet for ten minutes
/// let config = config.with_idle_eviction(Duration::from_secs(600), Duration::from_secs(60));
/// assert_eq!(config.idle_key_ttl, Some(Duration::from_secs(600)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Capacity of every per-key bucket. Fixed for the lifetime of the limiter.
    pub per_key_capacity: u64,

    /// Capacity of the single bucket shared by all keys.
    pub global_capacity: u64,

    /// Time needed to add one token to a bucket (global and per-key alike).
    pub fill_interval: Duration,

    /// Upper bound on how long a caller waits in the admission queue.
    pub queue_timeout: Duration,

    /// Remove per-key buckets that have not been touched for this long.
    ///
    /// `None` (the default) keeps every key for the lifetime of the limiter.
    pub idle_key_ttl: Option<Duration>,

    /// How often the idle-key sweeper runs. Ignored unless `idle_key_ttl` is set.
    pub sweep_interval: Duration,
}

impl Default for LimiterConfig {
    /// 60 requests per key and 1000 overall, one token per minute,
    /// five second queue wait, no idle eviction.
    fn default() -> Self {
        Self {
            per_key_capacity: 60,
            global_capacity: 1000,
            fill_interval: Duration::from_secs(60),
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            idle_key_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl LimiterConfig {
    /// Creates a configuration with the three required values and defaults
    /// for everything else.
    ///
    /// # Arguments
    ///
    /// * `per_key_capacity` - Burst allowed for a single key
    /// * `global_capacity` - Burst allowed across all keys
    /// * `fill_interval` - Time to add one token to a bucket
    pub fn new(per_key_capacity: u64, global_capacity: u64, fill_interval: Duration) -> Self {
        Self {
            per_key_capacity,
            global_capacity,
            fill_interval,
            ..Default::default()
        }
    }

    /// Sets how long deferred callers wait before timing out.
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// Enables eviction of per-key buckets idle for longer than `ttl`.
    ///
    /// Eviction changes observable behavior: an evicted key comes back with a
    /// full bucket the next time it is seen.
    pub fn with_idle_eviction(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.idle_key_ttl = Some(ttl);
        self.sweep_interval = sweep_interval;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`ConfigError`].
    ///
    /// ```rust
    /// use admitter::{ConfigError, LimiterConfig};
    /// use std::time::Duration;
    ///
    /// let config = LimiterConfig::new(10, 0, Duration::from_secs(1));
    /// assert_eq!(config.validate(), Err(ConfigError::ZeroGlobalCapacity));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_key_capacity == 0 {
            return Err(ConfigError::ZeroPerKeyCapacity);
        }
        if self.global_capacity == 0 {
            return Err(ConfigError::ZeroGlobalCapacity);
        }
        if self.fill_interval.is_zero() {
            return Err(ConfigError::ZeroFillInterval);
        }
        if self.queue_timeout.is_zero() {
            return Err(ConfigError::ZeroQueueTimeout);
        }
        if let Some(ttl) = self.idle_key_ttl {
            if ttl.is_zero() {
                return Err(ConfigError::ZeroIdleKeyTtl);
            }
            if self.sweep_interval.is_zero() {
                return Err(ConfigError::ZeroSweepInterval);
            }
        }
        Ok(())
    }

    /// Sustained rate of a single bucket, in tokens per second.
    ///
    /// Every bucket gains one token per `fill_interval`, so this is the same
    /// for the global bucket and for each key.
    ///
    /// ```rust
    /// use admitter::LimiterConfig;
    /// use std::time::Duration;
    ///
    /// let config = LimiterConfig::new(5, 50, Duration::from_millis(250));
    /// assert_eq!(config.tokens_per_second(), 4.0);
    /// ```
    pub fn tokens_per_second(&self) -> f64 {
        if self.fill_interval.is_zero() {
            0.0
        } else {
            1.0 / self.fill_interval.as_secs_f64()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LimiterConfig::default();
        assert_eq!(config.per_key_capacity, 60);
        assert_eq!(config.global_capacity, 1000);
        assert_eq!(config.fill_interval, Duration::from_secs(60));
        assert_eq!(config.queue_timeout, DEFAULT_QUEUE_TIMEOUT);
        assert_eq!(config.idle_key_ttl, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let second = Duration::from_secs(1);

        assert_eq!(
            LimiterConfig::new(0, 10, second).validate(),
            Err(ConfigError::ZeroPerKeyCapacity)
        );
        assert_eq!(
            LimiterConfig::new(10, 0, second).validate(),
            Err(ConfigError::ZeroGlobalCapacity)
        );
        assert_eq!(
            LimiterConfig::new(10, 10, Duration::ZERO).validate(),
            Err(ConfigError::ZeroFillInterval)
        );
        assert_eq!(
            LimiterConfig::new(10, 10, second)
                .with_queue_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroQueueTimeout)
        );
    }

    #[test]
    fn test_idle_eviction_validation() {
        let base = LimiterConfig::new(1, 1, Duration::from_secs(1));

        assert_eq!(
            base.clone()
                .with_idle_eviction(Duration::ZERO, Duration::from_secs(1))
                .validate(),
            Err(ConfigError::ZeroIdleKeyTtl)
        );
        assert_eq!(
            base.clone()
                .with_idle_eviction(Duration::from_secs(1), Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroSweepInterval)
        );

        // A zero sweep interval is irrelevant while eviction is off
        let mut disabled = base;
        disabled.sweep_interval = Duration::ZERO;
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_tokens_per_second() {
        let config = LimiterConfig::new(1, 1, Duration::from_millis(100));
        assert_eq!(config.tokens_per_second(), 10.0);

        let broken = LimiterConfig::new(1, 1, Duration::ZERO);
        assert_eq!(broken.tokens_per_second(), 0.0);
    }
}
