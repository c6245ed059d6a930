//! # Error Types
//!
//! Admission decisions never fail: every call to `allow` produces an
//! [`Admission`](super::Admission). The only failure path is building a
//! limiter from a configuration that cannot work, which is reported here.

use thiserror::Error;

/// A configuration value that would produce a limiter which always denies
/// (or never refills).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Per-key bucket capacity was zero.
    #[error("per_key_capacity must be greater than 0")]
    ZeroPerKeyCapacity,

    /// Global bucket capacity was zero.
    #[error("global_capacity must be greater than 0")]
    ZeroGlobalCapacity,

    /// A standalone bucket was given zero capacity.
    #[error("bucket capacity must be greater than 0")]
    ZeroCapacity,

    /// Refill interval was zero.
    #[error("fill_interval must be greater than 0")]
    ZeroFillInterval,

    /// Queue wait timeout was zero.
    #[error("queue_timeout must be greater than 0")]
    ZeroQueueTimeout,

    /// Idle eviction was enabled with a zero TTL.
    #[error("idle_key_ttl must be greater than 0 when idle eviction is enabled")]
    ZeroIdleKeyTtl,

    /// Idle eviction was enabled with a zero sweep interval.
    #[error("sweep_interval must be greater than 0 when idle eviction is enabled")]
    ZeroSweepInterval,
}

/// Errors raised while constructing a [`CompositeLimiter`](super::CompositeLimiter).
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The supplied configuration was rejected.
    #[error("invalid limiter configuration: {0}")]
    Config(#[from] ConfigError),

    /// No tokio runtime was running on the constructing thread, so the
    /// queue drainer could not be spawned.
    #[error("a tokio runtime is required to run the queue drainer")]
    NoRuntime,
}
