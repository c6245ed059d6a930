//! # Composite Limiter
//!
//! The public admission entry point. It ties the keyed registry, the
//! admission queue and the drainer together behind a single lock.
//!
//! ```text
//!     allow(key)
//!        │
//!        ▼  lock
//!     registry.admit(key) ──✅──► Admission { allowed: true }
//!        │ ❌
//!        ▼
//!     queue.enqueue() + doorbell.ring()
//!        │  unlock
//!        ▼
//!     await ticket (≤ queue_timeout)
//!        ├── drainer released us ──► allowed
//!        ├── drainer gone ─────────► denied, ""
//!        └── timer fired ──────────► denied, TIMEOUT_MESSAGE
//!
//!     drainer task (one per limiter):
//!        loop { doorbell.recv().await;
//!               lock; while queue non-empty && global.try_consume() { release head } }
//! ```
//!
//! ## Draining Only On Demand
//!
//! The drainer runs when the doorbell rings, and the doorbell rings when a
//! caller is enqueued (or when [`CompositeLimiter::notify_drainer`] is called).
//! There is no periodic drain. If the queue is non-empty and no new requests
//! arrive, waiting callers are released only by their own timeout, even if
//! the global bucket has refilled in the meantime. Under steady traffic each
//! new arrival re-triggers draining; embedders with bursty traffic can call
//! `notify_drainer` from their own timer.
//!
//! ## Queue Release Ignores Per-Key Quotas
//!
//! Only the global bucket gates release from the queue. A caller that was
//! queued because its own key was exhausted can be released purely on global
//! capacity.

use super::{
    config::LimiterConfig,
    error::LimiterError,
    metrics::LimiterStats,
    queue::{AdmissionQueue, Doorbell, Release, Ring},
    registry::KeyedRegistry,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Message returned to callers whose queue wait expired.
pub const TIMEOUT_MESSAGE: &str = "request timed out, try again later";

/// Fallback text for a denial that carries no message of its own.
pub const DEFAULT_DENY_MESSAGE: &str = "Too many requests";

/// Outcome of [`CompositeLimiter::allow`].
///
/// A timeout and a plain denial share this type and differ only in
/// [`message`](Admission::message); callers treat both as "not admitted now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    allowed: bool,
    message: &'static str,
}

impl Admission {
    /// The request may proceed.
    pub const ADMITTED: Self = Self {
        allowed: true,
        message: "",
    };

    /// The request was denied without a specific reason.
    pub const DENIED: Self = Self {
        allowed: false,
        message: "",
    };

    /// The request waited in the queue for the full timeout.
    pub const TIMED_OUT: Self = Self {
        allowed: false,
        message: TIMEOUT_MESSAGE,
    };

    /// Whether the request may proceed.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Human-readable reason; empty on success and on plain denials.
    #[inline]
    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Reason to show a rejected client, falling back to
    /// [`DEFAULT_DENY_MESSAGE`] when the denial carries no message.
    pub fn reason(&self) -> &'static str {
        if self.message.is_empty() && !self.allowed {
            DEFAULT_DENY_MESSAGE
        } else {
            self.message
        }
    }

    /// Splits into the `(allowed, message)` pair.
    #[inline]
    pub fn into_parts(self) -> (bool, &'static str) {
        (self.allowed, self.message)
    }
}

/// State guarded by the limiter's single lock.
#[derive(Debug)]
struct State {
    registry: KeyedRegistry,
    queue: AdmissionQueue,
}

#[derive(Debug, Default)]
struct Counters {
    immediately_admitted: AtomicU64,
    queued: AtomicU64,
    released: AtomicU64,
    timed_out: AtomicU64,
    disconnected: AtomicU64,
    abandoned_discarded: AtomicU64,
    abandoned_wasted: AtomicU64,
}

/// Everything the drainer and sweeper tasks share with the handles.
#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    counters: Counters,
    config: LimiterConfig,
}

impl Shared {
    /// One drain pass: release queued callers while the global bucket allows.
    ///
    /// Returns the number of live callers released.
    fn drain(&self) -> u64 {
        let mut guard = self.state.lock();
        let State { registry, queue } = &mut *guard;

        let mut released = 0;
        loop {
            let discarded = queue.discard_abandoned_head();
            if discarded > 0 {
                self.counters
                    .abandoned_discarded
                    .fetch_add(discarded as u64, Ordering::Relaxed);
            }

            if queue.is_empty() || !registry.admit_global() {
                break;
            }

            match queue.release_head() {
                Some(Release::Delivered) => released += 1,
                Some(Release::Abandoned) => {
                    self.counters.abandoned_wasted.fetch_add(1, Ordering::Relaxed);
                    warn!("queued caller gave up after a global token was spent on it");
                }
                None => break,
            }
        }
        released
    }

    fn sweep(&self, ttl: Duration) -> usize {
        self.state.lock().registry.evict_idle(ttl)
    }
}

/// Two-tier token bucket limiter with a bounded-wait admission queue.
///
/// Cloning is cheap and every clone shares the same buckets, queue and
/// drainer. The drainer stops once the last clone is dropped.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use admitter::{CompositeLimiter, LimiterConfig};
/// use std::time::Duration;
///
/// // 2 requests per client, 100 overall, one token per second
/// let limiter = CompositeLimiter::new(LimiterConfig::new(2, 100, Duration::from_secs(1))).unwrap();
///
/// let verdict = limiter.allow("192.168.1.10").await;
/// assert!(verdict.is_allowed());
/// assert_eq!(verdict.message(), "");
/// # }
/// ```
#[derive(Clone)]
pub struct CompositeLimiter {
    shared: Arc<Shared>,
    doorbell: Doorbell,
}

impl CompositeLimiter {
    /// Creates a limiter and spawns its drainer on the current tokio runtime.
    ///
    /// When `idle_key_ttl` is configured, an idle-key sweeper is spawned too.
    ///
    /// # Errors
    ///
    /// - [`LimiterError::Config`] if the configuration is invalid
    /// - [`LimiterError::NoRuntime`] if called outside a tokio runtime
    pub fn new(config: LimiterConfig) -> Result<Self, LimiterError> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                registry: KeyedRegistry::prevalidated(&config),
                queue: AdmissionQueue::new(),
            }),
            counters: Counters::default(),
            config,
        });

        let (doorbell, rx) = Doorbell::new();
        handle.spawn(drain_loop(Drainer {
            shared: shared.clone(),
            doorbell: rx,
        }));

        if let Some(ttl) = shared.config.idle_key_ttl {
            handle.spawn(sweep_loop(
                Arc::downgrade(&shared),
                ttl,
                shared.config.sweep_interval,
            ));
        }

        info!(
            per_key_capacity = shared.config.per_key_capacity,
            global_capacity = shared.config.global_capacity,
            fill_interval = ?shared.config.fill_interval,
            queue_timeout = ?shared.config.queue_timeout,
            "composite limiter started"
        );

        Ok(Self { shared, doorbell })
    }

    /// Decides whether a request identified by `key` may proceed.
    ///
    /// Admits immediately when both the global and the per-key bucket have a
    /// token. Otherwise the caller is queued and this future resolves when the
    /// drainer releases it, or after `queue_timeout` with
    /// [`TIMEOUT_MESSAGE`]. The lock is never held while waiting.
    ///
    /// Dropping the future abandons the queue slot; the drainer discards it.
    /// If the drainer is gone (its runtime shut down), a caller that cannot be
    /// admitted immediately gets [`Admission::DENIED`].
    pub async fn allow(&self, key: &str) -> Admission {
        let mut ticket = {
            let mut state = self.shared.state.lock();
            if state.registry.admit(key) {
                self.shared
                    .counters
                    .immediately_admitted
                    .fetch_add(1, Ordering::Relaxed);
                return Admission::ADMITTED;
            }

            // Ringing and enqueuing under one lock hold: the drainer closes
            // its doorbell under the same lock before dropping the queue.
            if self.doorbell.ring() == Ring::Closed {
                drop(state);
                self.disconnected(key);
                return Admission::DENIED;
            }
            state.queue.enqueue()
        };

        self.shared.counters.queued.fetch_add(1, Ordering::Relaxed);
        debug!(key, "request denied and queued");

        match timeout(self.shared.config.queue_timeout, &mut ticket).await {
            Ok(Ok(())) => self.released(),
            Ok(Err(_)) => {
                self.disconnected(key);
                Admission::DENIED
            }
            Err(_) => {
                // The drainer may have released us just as the timer fired
                ticket.close();
                if ticket.try_recv().is_ok() {
                    return self.released();
                }
                self.shared.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key,
                    timeout = ?self.shared.config.queue_timeout,
                    "queued request timed out"
                );
                Admission::TIMED_OUT
            }
        }
    }

    /// Counted by the waiter rather than the drainer, so a caller that has
    /// returned is always reflected in `stats`.
    fn released(&self) -> Admission {
        self.shared.counters.released.fetch_add(1, Ordering::Relaxed);
        Admission::ADMITTED
    }

    fn disconnected(&self, key: &str) {
        self.shared.counters.disconnected.fetch_add(1, Ordering::Relaxed);
        warn!(key, "admission queue drainer is gone, denying request");
    }

    /// Rings the doorbell without enqueuing anyone.
    ///
    /// Lets an embedder release waiting callers after the global bucket has
    /// refilled, without waiting for the next denied request. Returns `false`
    /// if a wake-up was already pending or the drainer is gone.
    pub fn notify_drainer(&self) -> bool {
        self.doorbell.ring() == Ring::Rung
    }

    /// Runs one idle-key eviction pass now.
    ///
    /// Returns the number of keys removed, or 0 when idle eviction is not
    /// configured.
    pub fn sweep_idle_keys(&self) -> usize {
        match self.shared.config.idle_key_ttl {
            Some(ttl) => self.shared.sweep(ttl),
            None => 0,
        }
    }

    /// Tokens left for `key`, or `None` if the key has not been seen.
    pub fn available_tokens(&self, key: &str) -> Option<u64> {
        self.shared.state.lock().registry.available(key)
    }

    /// Tokens left in the global bucket.
    pub fn global_available(&self) -> u64 {
        self.shared.state.lock().registry.global_available()
    }

    /// The configuration this limiter was built with.
    pub fn config(&self) -> &LimiterConfig {
        &self.shared.config
    }

    /// Snapshot of the limiter's counters.
    pub fn stats(&self) -> LimiterStats {
        let state = self.shared.state.lock();
        let counters = &self.shared.counters;
        LimiterStats {
            immediately_admitted: counters.immediately_admitted.load(Ordering::Relaxed),
            queued: counters.queued.load(Ordering::Relaxed),
            released: counters.released.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            disconnected: counters.disconnected.load(Ordering::Relaxed),
            abandoned_discarded: counters.abandoned_discarded.load(Ordering::Relaxed),
            abandoned_wasted: counters.abandoned_wasted.load(Ordering::Relaxed),
            tracked_keys: state.registry.len(),
            keys_created: state.registry.total_created(),
            keys_evicted: state.registry.total_evicted(),
            queue_depth: state.queue.len(),
            global_tokens: state.registry.global_available(),
            global_capacity: state.registry.global_capacity(),
        }
    }
}

impl std::fmt::Debug for CompositeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CompositeLimiter")
            .field("per_key_capacity", &self.shared.config.per_key_capacity)
            .field("global_capacity", &self.shared.config.global_capacity)
            .field("fill_interval", &self.shared.config.fill_interval)
            .field("tracked_keys", &state.registry.len())
            .field("queue_depth", &state.queue.len())
            .finish()
    }
}

/// State owned by the drainer task.
///
/// Dropping it (the loop ends, or the runtime drops the task) closes the
/// doorbell and resolves every queued caller as disconnected, so nobody
/// waits out a timeout for a drainer that no longer exists.
struct Drainer {
    shared: Arc<Shared>,
    doorbell: mpsc::Receiver<()>,
}

impl Drop for Drainer {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        self.doorbell.close();
        let dropped = state.queue.clear();
        if dropped > 0 {
            warn!(dropped, "admission queue drainer stopped with callers waiting");
        } else {
            debug!("admission queue drainer stopped");
        }
    }
}

/// Drainer task. Exits when every limiter handle (and its doorbell) is gone.
async fn drain_loop(mut drainer: Drainer) {
    debug!("admission queue drainer started");

    while drainer.doorbell.recv().await.is_some() {
        let released = drainer.shared.drain();
        if released > 0 {
            debug!(released, "released queued requests");
        }
    }
}

/// Idle-key sweeper task. Exits on the first tick after the limiter is gone.
async fn sweep_loop(shared: Weak<Shared>, ttl: Duration, every: Duration) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(ttl = ?ttl, interval = ?every, "idle key sweeper started");

    loop {
        ticker.tick().await;
        let Some(live) = shared.upgrade() else {
            break;
        };
        live.sweep(ttl);
    }

    info!("idle key sweeper stopped");
}
