use admitter::{
    client_key, Admission, CompositeLimiter, HealthStatus, LimiterBuilder, LimiterConfig,
    TokenBucket, DEFAULT_DENY_MESSAGE, TIMEOUT_MESSAGE,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{yield_now, JoinHandle};
use tokio::time::{advance, Instant};

const TICK: Duration = Duration::from_secs(1);

/// Lets spawned callers and the drainer run until they block again.
async fn settle() {
    for _ in 0..10 {
        yield_now().await;
    }
}

fn spawn_allow(limiter: &CompositeLimiter, key: &'static str) -> JoinHandle<Admission> {
    let limiter = limiter.clone();
    tokio::spawn(async move { limiter.allow(key).await })
}

#[tokio::test(start_paused = true)]
async fn test_bucket_admits_capacity_then_denies() {
    for capacity in [1, 7, 64] {
        let mut bucket = TokenBucket::new(capacity, TICK).unwrap();
        let admitted = (0..capacity).filter(|_| bucket.try_consume()).count() as u64;
        assert_eq!(admitted, capacity);
        assert!(!bucket.try_consume());
    }
}

#[tokio::test(start_paused = true)]
async fn test_bucket_refills_after_interval() {
    let mut bucket = TokenBucket::new(3, TICK).unwrap();
    while bucket.try_consume() {}

    advance(TICK).await;
    assert!(bucket.try_consume());
}

#[tokio::test(start_paused = true)]
async fn test_bucket_never_exceeds_capacity() {
    let mut bucket = TokenBucket::new(5, TICK).unwrap();
    while bucket.try_consume() {}

    advance(TICK * 100).await;

    let admitted = (0..20).filter(|_| bucket.try_consume()).count();
    assert_eq!(admitted, 5);
}

#[tokio::test(start_paused = true)]
async fn test_global_deny_does_not_touch_per_key_bucket() {
    let config = LimiterConfig::new(10, 1, Duration::from_secs(3600))
        .with_queue_timeout(Duration::from_millis(100));
    let limiter = CompositeLimiter::new(config).unwrap();

    // Exhaust the global bucket from another key
    assert!(limiter.allow("other").await.is_allowed());
    assert_eq!(limiter.global_available(), 0);

    let verdict = limiter.allow("k").await;
    assert!(!verdict.is_allowed());
    assert_eq!(limiter.available_tokens("k"), Some(10));

    // Global capacity comes back: "k" still has its full allotment
    advance(Duration::from_secs(3600)).await;
    assert!(limiter.allow("k").await.is_allowed());
    assert_eq!(limiter.available_tokens("k"), Some(9));
}

#[tokio::test(start_paused = true)]
async fn test_per_key_deny_spends_global_token() {
    let config = LimiterConfig::new(1, 100, Duration::from_secs(3600));
    let limiter = CompositeLimiter::new(config).unwrap();

    assert!(limiter.allow("k").await.is_allowed());
    assert_eq!(limiter.global_available(), 99);

    // Denied by its own bucket, then released from the queue by the drainer:
    // one global token for the failed attempt, one for the release.
    assert!(limiter.allow("k").await.is_allowed());
    assert_eq!(limiter.global_available(), 97);
}

#[tokio::test(start_paused = true)]
async fn test_queue_releases_in_fifo_order() {
    let limiter = CompositeLimiter::new(LimiterConfig::new(1, 1, TICK)).unwrap();
    assert!(limiter.allow("x").await.is_allowed());

    let mut waiters = Vec::new();
    for (depth, key) in ["a", "b", "c"].into_iter().enumerate() {
        waiters.push(spawn_allow(&limiter, key));
        settle().await;
        assert_eq!(limiter.stats().queue_depth, depth + 1);
    }

    // Exactly one global token becomes available
    advance(TICK).await;
    assert!(limiter.notify_drainer());
    settle().await;

    let c = waiters.pop().unwrap();
    let b = waiters.pop().unwrap();
    let a = waiters.pop().unwrap();

    assert!(a.is_finished());
    assert!(!b.is_finished());
    assert!(!c.is_finished());
    assert_eq!(a.await.unwrap(), Admission::ADMITTED);
    assert_eq!(limiter.stats().queue_depth, 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_wakeup_drains_up_to_capacity() {
    let limiter = CompositeLimiter::new(LimiterConfig::new(1, 2, TICK)).unwrap();
    assert!(limiter.allow("x").await.is_allowed());
    assert!(limiter.allow("y").await.is_allowed());
    assert_eq!(limiter.global_available(), 0);

    let mut waiters = Vec::new();
    for key in ["a", "b", "c"] {
        waiters.push(spawn_allow(&limiter, key));
        settle().await;
    }
    assert_eq!(limiter.stats().queue_depth, 3);

    // Two global tokens, one doorbell ring
    advance(TICK * 2).await;
    assert!(limiter.notify_drainer());
    settle().await;

    let c = waiters.pop().unwrap();
    let b = waiters.pop().unwrap();
    let a = waiters.pop().unwrap();

    assert!(a.is_finished());
    assert!(b.is_finished());
    assert!(!c.is_finished());
    assert_eq!(a.await.unwrap(), Admission::ADMITTED);
    assert_eq!(b.await.unwrap(), Admission::ADMITTED);

    let stats = limiter.stats();
    assert_eq!(stats.queue_depth, 1);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.global_tokens, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_boundary() {
    let timeout = Duration::from_millis(750);
    let config = LimiterConfig::new(1, 1, Duration::from_secs(3600)).with_queue_timeout(timeout);
    let limiter = CompositeLimiter::new(config).unwrap();
    assert!(limiter.allow("a").await.is_allowed());

    let start = Instant::now();
    let verdict = limiter.allow("b").await;
    let elapsed = start.elapsed();

    assert_eq!(verdict.into_parts(), (false, TIMEOUT_MESSAGE));
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_refill_without_doorbell_leaves_queue_waiting() {
    let config = LimiterConfig::new(1, 1, TICK).with_queue_timeout(Duration::from_secs(5));
    let limiter = CompositeLimiter::new(config).unwrap();
    assert!(limiter.allow("a").await.is_allowed());

    // The global bucket refills after one second, but nothing rings the
    // doorbell again, so the caller waits out its full timeout.
    let verdict = limiter.allow("b").await;
    assert_eq!(verdict, Admission::TIMED_OUT);
    assert_eq!(limiter.global_available(), 1);

    let stats = limiter.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.released, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_share_a_token() {
    const CALLERS: usize = 64;
    const CAPACITY: u64 = 10;

    let config = LimiterConfig::new(CAPACITY, 10_000, Duration::from_secs(3600))
        .with_queue_timeout(Duration::from_secs(5));
    let limiter = CompositeLimiter::new(config).unwrap();
    let admitted = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            tokio::spawn(async move {
                let verdict = limiter.allow("same-key").await;
                if verdict.is_allowed() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
                verdict
            })
        })
        .collect();

    for handle in handles {
        let verdict = handle.await.unwrap();
        assert!(verdict.is_allowed() || verdict.message() == TIMEOUT_MESSAGE);
    }

    let stats = limiter.stats();
    assert_eq!(stats.immediately_admitted, CAPACITY);
    assert_eq!(stats.queued, CALLERS as u64 - CAPACITY);
    assert_eq!(stats.total_admitted() + stats.timed_out, CALLERS as u64);
    assert_eq!(admitted.load(Ordering::SeqCst), stats.total_admitted());
    assert_eq!(limiter.available_tokens("same-key"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_idle_keys_evicted_when_enabled() {
    let limiter = LimiterBuilder::new()
        .per_key_capacity(2)
        .global_capacity(100)
        .fill_interval(TICK)
        .idle_eviction(Duration::from_secs(30), Duration::from_secs(10))
        .build()
        .unwrap();

    assert!(limiter.allow("quiet").await.is_allowed());
    assert!(limiter.allow("quiet").await.is_allowed());

    tokio::time::sleep(Duration::from_secs(45)).await;
    settle().await;

    assert_eq!(limiter.available_tokens("quiet"), None);
    assert_eq!(limiter.stats().keys_evicted, 1);

    // Back with a fresh bucket
    assert!(limiter.allow("quiet").await.is_allowed());
    assert_eq!(limiter.available_tokens("quiet"), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_keys_kept_without_eviction() {
    let limiter = CompositeLimiter::new(LimiterConfig::new(2, 100, TICK)).unwrap();
    assert!(limiter.allow("quiet").await.is_allowed());

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(limiter.stats().tracked_keys, 1);
    assert_eq!(limiter.available_tokens("quiet"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_stats_and_health_under_pressure() {
    let config = LimiterConfig::new(1, 1, Duration::from_secs(3600))
        .with_queue_timeout(Duration::from_millis(10));
    let limiter = CompositeLimiter::new(config).unwrap();

    assert_eq!(limiter.stats().health_status(), HealthStatus::Healthy);

    assert!(limiter.allow("a").await.is_allowed());
    let verdict = limiter.allow("b").await;
    assert_eq!(verdict.reason(), TIMEOUT_MESSAGE);

    let stats = limiter.stats();
    assert_eq!(stats.total_requests(), 2);
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.health_status(), HealthStatus::Critical);
    assert!(stats.summary().contains("Timed Out: 1"));
}

#[test]
fn test_http_key_and_deny_message() {
    let key = client_key(Some(""), "192.0.2.1:40000");
    assert_eq!(key, "192.0.2.1:40000");
    assert_eq!(Admission::DENIED.reason(), DEFAULT_DENY_MESSAGE);
}
