//! # Rate Limiter Module
//!
//! Internal implementation of the composite limiter, one file per component.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (LimiterConfig and validation)
//!     ├── error.rs        (ConfigError, LimiterError)
//!     ├── core.rs         (Token bucket with lazy refill)
//!     ├── registry.rs     (Per-key buckets under one global bucket)
//!     ├── queue.rs        (FIFO admission queue and drainer doorbell)
//!     ├── limiter.rs      (CompositeLimiter, drainer and sweeper tasks)
//!     ├── metrics.rs      (Statistics and health)
//!     └── utils.rs        (Admission key derivation)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     allow(key)
//!          │
//!          ▼
//!     ┌──────────┐
//!     │ Limiter  │ ◄── single lock, queue wait, timeout
//!     └────┬─────┘
//!          │
//!          ├──────────────────┐
//!          ▼                  ▼
//!     ┌──────────┐      ┌──────────┐
//!     │ Registry │      │  Queue   │ ◄── drained on global capacity
//!     └────┬─────┘      └──────────┘
//!          │
//!          ▼
//!     ┌──────────┐
//!     │   Core   │ ◄── token bucket algorithm
//!     └──────────┘
//! ```

mod config;
mod core;
mod error;
mod limiter;
mod metrics;
mod queue;
mod registry;
mod utils;

/// Configuration and its defaults
pub use config::{LimiterConfig, DEFAULT_QUEUE_TIMEOUT, DEFAULT_SWEEP_INTERVAL};

/// Single token bucket
pub use core::TokenBucket;

/// Construction errors
pub use error::{ConfigError, LimiterError};

/// The admission entry point and its result type
pub use limiter::{Admission, CompositeLimiter, DEFAULT_DENY_MESSAGE, TIMEOUT_MESSAGE};

/// Observability
pub use metrics::{HealthStatus, LimiterStats};

/// Per-key buckets nested in a global bucket, without the queue
pub use registry::KeyedRegistry;

pub use utils::client_key;
