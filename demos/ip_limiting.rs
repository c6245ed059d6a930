//! Many clients sharing one global budget, keyed the way an HTTP
//! middleware would key them.

use admitter::{client_key, LimiterBuilder};
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("admitter=debug").init();

    let limiter = LimiterBuilder::new()
        .per_key_capacity(5)
        .global_capacity(12)
        .fill_interval(Duration::from_millis(100))
        .queue_timeout(Duration::from_secs(1))
        .idle_eviction(Duration::from_secs(2), Duration::from_millis(500))
        .build()
        .unwrap();

    // (X-Forwarded-For, remote address) pairs
    let requests = [
        (Some("198.51.100.1"), "10.0.0.2:40001"),
        (None, "192.168.1.2:51000"),
        (Some(""), "192.168.1.3:51001"),
    ];

    let mut handles = Vec::new();
    for (forwarded_for, remote_addr) in requests {
        let key = client_key(forwarded_for, remote_addr).to_owned();
        for i in 1..=8 {
            let limiter = limiter.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                let verdict = limiter.allow(&key).await;
                if verdict.is_allowed() {
                    println!("{} - Request {} allowed", key, i);
                } else {
                    println!("{} - Request {} BLOCKED: {}", key, i, verdict.reason());
                }
            }));
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    println!("\n{}", limiter.stats().summary());

    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("\nAfter idle eviction: {} keys tracked", limiter.stats().tracked_keys);
}
