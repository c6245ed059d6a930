//! Basic usage example for the admitter crate.

use admitter::{CompositeLimiter, LimiterBuilder, LimiterConfig, TokenBucket};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Basic Admission Example ===\n");

    // Example 1: A single token bucket
    bucket_example().await;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Per-key limit with queue release
    queue_release_example().await;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Global limit with queue timeout
    timeout_example().await;
}

async fn bucket_example() {
    println!("1. Single Token Bucket:");

    let mut bucket = TokenBucket::new(5, Duration::from_millis(200)).unwrap();
    println!("   Created bucket with 5 tokens, one token every 200ms");

    for i in 1..=7 {
        if bucket.try_consume() {
            println!("   Request {} - ✅ Allowed", i);
        } else {
            println!("   Request {} - ❌ Rate limited", i);
        }
    }

    tokio::time::sleep(Duration::from_millis(450)).await;
    println!("   After 450ms: {} tokens available", bucket.available());
}

async fn queue_release_example() {
    println!("2. Per-Key Limit, Released From Queue:");

    // 3 per key, plenty of global capacity
    let config = LimiterConfig::new(3, 100, Duration::from_secs(1));
    let limiter = CompositeLimiter::new(config).unwrap();

    for i in 1..=5 {
        let verdict = limiter.allow("alice").await;
        println!(
            "   Request {} - allowed: {}, message: {:?}",
            i,
            verdict.is_allowed(),
            verdict.message()
        );
    }

    let stats = limiter.stats();
    println!(
        "   Immediately admitted: {}, released from queue: {}",
        stats.immediately_admitted, stats.released
    );
}

async fn timeout_example() {
    println!("3. Global Limit, Queue Timeout:");

    let limiter = LimiterBuilder::new()
        .per_key_capacity(10)
        .global_capacity(2)
        .fill_interval(Duration::from_secs(60))
        .queue_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    for key in ["a", "b", "c"] {
        let verdict = limiter.allow(key).await;
        if verdict.is_allowed() {
            println!("   Client {} - ✅ Allowed", key);
        } else {
            println!("   Client {} - ⛔ {}", key, verdict.reason());
        }
    }

    println!("\n{}", limiter.stats().summary());
}
