//! # Limiter Statistics
//!
//! Point-in-time counters for a composite limiter, plus a coarse health
//! assessment derived from them.
//!
//! ```text
//!     Admission Paths:
//!
//!     allow() ──┬──► immediately admitted
//!               │
//!               └──► queued ──┬──► released by drainer
//!                             ├──► timed out
//!                             └──► abandoned (discarded / wasted a token)
//! ```

use std::fmt;

/// Snapshot of a [`CompositeLimiter`](super::CompositeLimiter)'s counters.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use admitter::{CompositeLimiter, LimiterConfig};
/// use std::time::Duration;
///
/// let limiter = CompositeLimiter::new(LimiterConfig::new(5, 50, Duration::from_secs(1))).unwrap();
/// limiter.allow("10.0.0.1").await;
///
/// let stats = limiter.stats();
/// assert_eq!(stats.immediately_admitted, 1);
/// println!("{}", stats.summary());
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Requests admitted without waiting.
    pub immediately_admitted: u64,

    /// Requests that failed immediate admission and joined the queue.
    pub queued: u64,

    /// Queued requests later admitted by the drainer.
    pub released: u64,

    /// Queued requests whose wait expired.
    pub timed_out: u64,

    /// Queued requests that received a plain deny because the drainer was gone.
    pub disconnected: u64,

    /// Abandoned queue entries dropped without spending a global token.
    pub abandoned_discarded: u64,

    /// Abandoned queue entries that were released after spending a global token.
    pub abandoned_wasted: u64,

    /// Keys currently holding a bucket.
    pub tracked_keys: usize,

    /// Per-key buckets created since startup.
    pub keys_created: u64,

    /// Per-key buckets removed by idle eviction.
    pub keys_evicted: u64,

    /// Callers waiting in the queue right now (including abandoned slots).
    pub queue_depth: usize,

    /// Tokens left in the global bucket.
    pub global_tokens: u64,

    /// Capacity of the global bucket.
    pub global_capacity: u64,
}

impl LimiterStats {
    /// Total admitted requests, with or without waiting.
    #[inline]
    pub fn total_admitted(&self) -> u64 {
        self.immediately_admitted + self.released
    }

    /// Total calls to `allow` that have finished or are still waiting.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.immediately_admitted + self.queued
    }

    /// Fraction of requests admitted so far (1.0 when idle).
    pub fn admission_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.total_admitted() as f64 / total as f64
        }
    }

    /// Fraction of queued requests that timed out (0.0 when nothing queued).
    pub fn timeout_ratio(&self) -> f64 {
        if self.queued == 0 {
            0.0
        } else {
            self.timed_out as f64 / self.queued as f64
        }
    }

    /// Coarse health assessment.
    ///
    /// - **Critical**: more than 30% of queued callers time out
    /// - **Degraded**: callers are waiting or the global bucket is empty
    /// - **Healthy**: otherwise
    pub fn health_status(&self) -> HealthStatus {
        if self.timeout_ratio() > 0.3 {
            HealthStatus::Critical
        } else if self.queue_depth > 0 || self.global_tokens == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Human-readable multi-line report.
    pub fn summary(&self) -> String {
        format!(
            "Composite Limiter Stats:\n\
             ├─ Admission:\n\
             │  ├─ Immediately Admitted: {}\n\
             │  ├─ Released From Queue: {}\n\
             │  ├─ Timed Out: {}\n\
             │  └─ Admission Rate: {:.2}%\n\
             ├─ Queue:\n\
             │  ├─ Depth: {}\n\
             │  ├─ Total Queued: {}\n\
             │  └─ Abandoned: {} discarded, {} wasted\n\
             ├─ Keys:\n\
             │  ├─ Tracked: {}\n\
             │  ├─ Created: {}\n\
             │  └─ Evicted: {}\n\
             └─ Global:\n\
                ├─ Tokens: {}/{}\n\
                └─ Status: {}",
            self.immediately_admitted,
            self.released,
            self.timed_out,
            self.admission_rate() * 100.0,
            self.queue_depth,
            self.queued,
            self.abandoned_discarded,
            self.abandoned_wasted,
            self.tracked_keys,
            self.keys_created,
            self.keys_evicted,
            self.global_tokens,
            self.global_capacity,
            self.health_status(),
        )
    }
}

impl fmt::Display for LimiterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Health indicator derived from [`LimiterStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Capacity available, nobody waiting.
    Healthy,

    /// Requests are being deferred but still mostly get through.
    Degraded,

    /// A large share of deferred requests time out.
    Critical,
}

impl HealthStatus {
    /// Returns true for anything but `Healthy`.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Operator hint for the current status.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Monitor closely, consider raising global capacity",
            Self::Critical => "Immediate action required: raise capacity or shed load",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> LimiterStats {
        LimiterStats {
            immediately_admitted: 80,
            queued: 20,
            released: 10,
            timed_out: 2,
            global_tokens: 5,
            global_capacity: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_rates() {
        let stats = stats();
        assert_eq!(stats.total_requests(), 100);
        assert_eq!(stats.total_admitted(), 90);
        assert_eq!(stats.admission_rate(), 0.9);
        assert_eq!(stats.timeout_ratio(), 0.1);
    }

    #[test]
    fn test_idle_rates() {
        let stats = LimiterStats::default();
        assert_eq!(stats.admission_rate(), 1.0);
        assert_eq!(stats.timeout_ratio(), 0.0);
    }

    #[test]
    fn test_health_status() {
        assert_eq!(stats().health_status(), HealthStatus::Healthy);

        let waiting = LimiterStats {
            queue_depth: 3,
            ..stats()
        };
        assert_eq!(waiting.health_status(), HealthStatus::Degraded);

        let exhausted = LimiterStats {
            global_tokens: 0,
            ..stats()
        };
        assert_eq!(exhausted.health_status(), HealthStatus::Degraded);

        let timing_out = LimiterStats {
            timed_out: 15,
            ..stats()
        };
        assert_eq!(timing_out.health_status(), HealthStatus::Critical);
    }

    #[test]
    fn test_health_status_methods() {
        assert!(!HealthStatus::Healthy.is_unhealthy());
        assert!(HealthStatus::Degraded.is_unhealthy());
        assert!(HealthStatus::Critical.suggested_action().contains("Immediate"));
        assert_eq!(HealthStatus::Degraded.to_string(), "Degraded");
    }

    #[test]
    fn test_summary() {
        let summary = stats().to_string();
        assert!(summary.contains("Immediately Admitted: 80"));
        assert!(summary.contains("Tokens: 5/100"));
        assert!(summary.contains("Status: Healthy"));
    }
}
