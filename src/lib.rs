//! # Admitter - Two-Tier Admission Control for Async Rust
//!
//! A request admission limiter that combines a per-client token bucket with a
//! global token bucket, and gives callers that miss out a short, bounded wait
//! in a FIFO queue instead of rejecting them outright.
//!
//! ## The Token Bucket Algorithm
//!
//! Every bucket holds up to `capacity` tokens and gains one token every
//! `fill_interval`:
//!
//! ```text
//!     Token Bucket Visualization (capacity 5):
//!
//!     t = 0:        [🪙🪙🪙🪙🪙] (full)
//!     Request 1:    [🪙🪙🪙🪙]   ✅
//!     Request 2:    [🪙🪙🪙]     ✅
//!     t = +1 tick:  [🪙🪙🪙🪙]   (one token per tick)
//!     t = +2.7:     [🪙🪙🪙🪙🪙] (whole ticks only, capped at capacity)
//! ```
//!
//! ## Two Tiers
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │     Your Application     │
//!                    └────────────┬─────────────┘
//!                                 │ allow(key).await
//!                    ┌────────────▼─────────────┐
//!                    │    CompositeLimiter      │
//!                    └────────────┬─────────────┘
//!                                 │
//!                ┌────────────────┴────────────────┐
//!                │                                 │
//!     ┌──────────▼──────────┐          ┌───────────▼──────────┐
//!     │   Keyed Registry    │          │   Admission Queue    │
//!     ├─────────────────────┤          ├──────────────────────┤
//!     │ • Global bucket     │ ✅/❌   │ • FIFO of waiters    │
//!     │ • Bucket per key    │ ───────► │ • Drainer task       │
//!     │ • Lazy refill       │   ❌    │ • 5s wait by default │
//!     └─────────────────────┘          └──────────────────────┘
//! ```
//!
//! 1. The global bucket is asked first. If it is empty, the caller is deferred
//!    without touching its per-key bucket.
//! 2. Otherwise the key's bucket is asked. If it is empty, the caller is
//!    deferred too (the global token is already spent).
//! 3. Deferred callers wait in the queue. A drainer task releases them in
//!    arrival order as long as the global bucket has tokens.
//! 4. A caller still waiting after `queue_timeout` gets
//!    [`TIMEOUT_MESSAGE`].
//!
//! ## Quick Start
//!
//! ```rust
//! use admitter::{CompositeLimiter, LimiterConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // 60 requests per client, 1000 overall, one token per second
//! let limiter = CompositeLimiter::new(LimiterConfig::new(60, 1000, Duration::from_secs(1))).unwrap();
//!
//! let verdict = limiter.allow("203.0.113.9").await;
//! if verdict.is_allowed() {
//!     // Handle the request
//! } else {
//!     // Respond with 429 and verdict.reason()
//! }
//! # }
//! ```
//!
//! ### Builder Pattern
//!
//! ```rust
//! use admitter::LimiterBuilder;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = LimiterBuilder::new()
//!     .per_key_capacity(10)
//!     .global_capacity(200)
//!     .fill_interval(Duration::from_millis(100))
//!     .queue_timeout(Duration::from_secs(2))
//!     .build()
//!     .unwrap();
//!
//! assert!(limiter.allow("client-a").await.is_allowed());
//! # }
//! ```
//!
//! ## Runtime
//!
//! The limiter spawns its drainer on the tokio runtime it is created in, so
//! it must be built from inside a runtime. `allow` never holds the internal
//! lock across an `.await`.
//!
//! ## Logging
//!
//! Events are emitted through `tracing`. The crate never installs a
//! subscriber; see `demos/` for a setup with `tracing-subscriber`.
//!
//! ## Examples
//!
//! See the `demos/` directory:
//! - `basic.rs` - Single-key limiting and queue timeouts
//! - `ip_limiting.rs` - Many clients sharing a global budget

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod rate_limiter;

use std::time::Duration;

pub use rate_limiter::{
    client_key, Admission, CompositeLimiter, ConfigError, HealthStatus, KeyedRegistry,
    LimiterConfig, LimiterError, LimiterStats, TokenBucket, DEFAULT_DENY_MESSAGE,
    DEFAULT_QUEUE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, TIMEOUT_MESSAGE,
};

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// ```rust
/// use admitter::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical admission control use cases.
    //!
    //! # Example
    //! ```rust
    //! use admitter::prelude::*;
    //! use std::time::Duration;
    //!
    //! let config = LimiterConfig::new(5, 50, Duration::from_secs(1));
    //! let builder = LimiterBuilder::from_config(config);
    //! let status = HealthStatus::Healthy;
    //! ```

    pub use crate::{
        client_key, Admission, CompositeLimiter, HealthStatus, LimiterBuilder, LimiterConfig,
        LimiterError, LimiterStats,
    };
}

/// Builder for [`CompositeLimiter`] with validated configuration.
///
/// Starts from [`LimiterConfig::default`] (60 per key, 1000 global, one token
/// per minute, 5 second queue wait, no idle eviction).
///
/// # Example
///
/// ```rust
/// use admitter::{ConfigError, LimiterBuilder, LimiterError};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = LimiterBuilder::new()
///     .per_key_capacity(100)
///     .fill_interval(Duration::from_millis(600))
///     .idle_eviction(Duration::from_secs(600), Duration::from_secs(60))
///     .build()
///     .unwrap();
/// assert_eq!(limiter.config().per_key_capacity, 100);
///
/// // Invalid values are rejected at build time
/// let result = LimiterBuilder::new().global_capacity(0).build();
/// assert!(matches!(result, Err(LimiterError::Config(ConfigError::ZeroGlobalCapacity))));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LimiterBuilder {
    config: LimiterConfig,
}

impl LimiterBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: LimiterConfig) -> Self {
        Self { config }
    }

    /// Sets the burst allowed for a single key.
    pub fn per_key_capacity(mut self, capacity: u64) -> Self {
        self.config.per_key_capacity = capacity;
        self
    }

    /// Sets the burst allowed across all keys.
    pub fn global_capacity(mut self, capacity: u64) -> Self {
        self.config.global_capacity = capacity;
        self
    }

    /// Sets the time needed to add one token to a bucket.
    ///
    /// Common values:
    /// - 1 s = one request per second per bucket
    /// - 60 s = one request per minute per bucket
    pub fn fill_interval(mut self, interval: Duration) -> Self {
        self.config.fill_interval = interval;
        self
    }

    /// Sets how long a deferred caller may wait in the queue.
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.config.queue_timeout = timeout;
        self
    }

    /// Enables idle-key eviction.
    pub fn idle_eviction(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.config = self.config.with_idle_eviction(ttl, sweep_interval);
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Validates the configuration and starts the limiter on the current
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`CompositeLimiter::new`].
    pub fn build(self) -> Result<CompositeLimiter, LimiterError> {
        CompositeLimiter::new(self.config)
    }
}
