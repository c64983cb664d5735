//! Rate Limiter Integration Tests
//!
//! Real-time checks of the sliding window limiter, including loading the
//! route table from settings.
//!
//! Run with: cargo test -p integration-tests --test ratelimit_tests

use std::sync::Arc;
use std::time::Duration;

use chat_sdk_common::RateLimitSettings;
use chat_sdk_ratelimit::{RateLimiter, ScopeParams};
use integration_tests::fixtures::*;
use tokio::time::Instant;
use uuid::Uuid;

#[tokio::test]
async fn test_scopes_do_not_block_each_other() {
    let limiter = RateLimiter::new(true).with_routes(routes());
    let channel_a = ScopeParams::new().with("channel_id", "A");
    let channel_b = ScopeParams::new().with("channel_id", "B");

    let start = Instant::now();
    limiter.acquire_route("send-message", &channel_a).await;
    limiter.acquire_route("send-message", &channel_a).await;

    // Channel A is full; channel B has its own bucket
    limiter.acquire_route("send-message", &channel_b).await;
    assert!(start.elapsed() < Duration::from_millis(150));

    limiter.acquire_route("send-message", &channel_a).await;
    assert!(start.elapsed() >= Duration::from_millis(290));
    assert_eq!(limiter.bucket_count(), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_window() {
    let limiter = Arc::new(RateLimiter::new(true).with_routes(routes()));
    let params = ScopeParams::new().with("channel_id", "shared");

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let limiter = Arc::clone(&limiter);
        let params = params.clone();
        handles.push(tokio::spawn(async move {
            limiter.acquire_route("send-message", &params).await;
            start.elapsed()
        }));
    }

    let mut elapsed = Vec::new();
    for handle in handles {
        elapsed.push(handle.await.unwrap());
    }
    elapsed.sort();

    // Two per 300ms: the last pair waits one full window
    assert!(elapsed[1] < Duration::from_millis(150));
    assert!(elapsed[2] >= Duration::from_millis(290));
    assert!(elapsed[3] >= Duration::from_millis(290));
    assert_eq!(limiter.bucket_count(), 1);
}

#[tokio::test]
async fn test_from_settings_loads_routes_file() {
    let path = std::env::temp_dir().join(format!("routes-{}.json", Uuid::new_v4()));
    std::fs::write(&path, ROUTES_JSON).unwrap();

    let settings = RateLimitSettings {
        enabled: true,
        routes_file: Some(path.clone()),
    };
    let limiter = RateLimiter::from_settings(&settings).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(limiter.is_enabled());
    assert_eq!(limiter.routes().len(), 2);
    assert!(limiter.routes().get("update-presence").is_some());
}

#[tokio::test]
async fn test_disabled_limiter_never_waits() {
    let settings = RateLimitSettings {
        enabled: false,
        routes_file: None,
    };
    let limiter = RateLimiter::from_settings(&settings).unwrap().with_routes(routes());

    let start = Instant::now();
    for _ in 0..10 {
        limiter
            .acquire_route("update-presence", &ScopeParams::new())
            .await;
    }
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(limiter.bucket_count(), 0);
}
