//! Bucket registry
//!
//! Buckets are created lazily per key and shared between every caller that
//! computes the same key.

use crate::bucket::Bucket;
use crate::route::{RouteLimit, RouteTable, ScopeParams};
use chat_sdk_common::{RateLimitSettings, SdkResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Client-side rate limiter
pub struct RateLimiter {
    enabled: bool,
    routes: RouteTable,
    buckets: DashMap<String, Arc<Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with an empty route table
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            routes: RouteTable::new(),
            buckets: DashMap::new(),
        }
    }

    /// Create a limiter that admits everything immediately
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Build a limiter from settings, loading the route table file if one is configured
    pub fn from_settings(settings: &RateLimitSettings) -> SdkResult<Self> {
        let routes = match &settings.routes_file {
            Some(path) => {
                let routes = RouteTable::from_file(path)?;
                info!(path = %path.display(), routes = routes.len(), "Loaded rate limit routes");
                routes
            }
            None => RouteTable::new(),
        };

        Ok(Self::new(settings.enabled).with_routes(routes))
    }

    /// Replace the route table
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Get the bucket for a call, creating it on first use.
    ///
    /// Concurrent callers computing the same key always get the same bucket.
    pub fn get_bucket(&self, limit: &RouteLimit, params: &ScopeParams) -> Arc<Bucket> {
        let key = limit.bucket_key(params);
        if let Some(bucket) = self.buckets.get(&key) {
            return Arc::clone(bucket.value());
        }

        let entry = self.buckets.entry(key.clone()).or_insert_with(|| {
            debug!(bucket = %key, limit = limit.effective_limit(), window_ms = limit.window_ms, "Creating bucket");
            Arc::new(Bucket::new(key.clone(), limit.effective_limit(), limit.window()))
        });
        Arc::clone(entry.value())
    }

    /// Wait for admission on the bucket selected by `limit` and `params`.
    ///
    /// Returns immediately when the limiter is disabled.
    pub async fn acquire(&self, limit: &RouteLimit, params: &ScopeParams) {
        if !self.enabled {
            return;
        }

        // The map guard is released before waiting
        let bucket = self.get_bucket(limit, params);
        bucket.acquire().await;
    }

    /// Wait for admission on a route from the route table.
    ///
    /// Routes without a configured limit are admitted immediately.
    pub async fn acquire_route(&self, route: &str, params: &ScopeParams) {
        if !self.enabled {
            return;
        }

        let Some(limit) = self.routes.get(route) else {
            debug!(route = %route, "No rate limit configured for route");
            return;
        };
        self.acquire(limit, params).await;
    }

    /// Number of live buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Remove buckets that have been quiet for `max_idle` and that nobody
    /// else holds. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut evicted = 0;

        self.buckets.retain(|_, bucket| {
            let keep = Arc::strong_count(bucket) > 1 || !bucket.is_idle(now, max_idle);
            if !keep {
                evicted += 1;
            }
            keep
        });

        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "Evicted idle buckets");
        }
        evicted
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("routes", &self.routes.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn send_message() -> RouteLimit {
        RouteLimit::new("send-message", 5, Duration::from_secs(5)).scoped_by(["channel_id"])
    }

    fn channel(id: &str) -> ScopeParams {
        ScopeParams::new().with("channel_id", id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_buckets_are_independent() {
        let limiter = Arc::new(RateLimiter::new(true));
        let limit = send_message();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire(&limit, &channel("A")).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Sixth call on A has to wait for the window
        let sixth = {
            let limiter = Arc::clone(&limiter);
            let limit = limit.clone();
            tokio::spawn(async move {
                limiter.acquire(&limit, &channel("A")).await;
                Instant::now()
            })
        };
        tokio::task::yield_now().await;

        // Channel B is unaffected
        limiter.acquire(&limit, &channel("B")).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.bucket_count(), 2);

        let admitted_at = sixth.await.unwrap();
        assert!(admitted_at.duration_since(start) >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_shares_bucket() {
        let limiter = RateLimiter::new(true);
        let limit = send_message();

        let a = limiter.get_bucket(&limit, &channel("A").with("nonce", "1"));
        let b = limiter.get_bucket(&limit, &channel("A").with("nonce", "2"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_admits_immediately() {
        let limiter = RateLimiter::disabled();
        let limit = RouteLimit::new("r", 1, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..100 {
            limiter.acquire(&limit, &ScopeParams::new()).await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_route_from_table() {
        let routes: RouteTable = [RouteLimit::new("get-gateway", 1, Duration::from_secs(2))]
            .into_iter()
            .collect();
        let limiter = RateLimiter::new(true).with_routes(routes);
        let start = Instant::now();

        limiter.acquire_route("get-gateway", &ScopeParams::new()).await;
        limiter.acquire_route("get-gateway", &ScopeParams::new()).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_route_admits_immediately() {
        let limiter = RateLimiter::new(true);
        let start = Instant::now();

        for _ in 0..10 {
            limiter.acquire_route("not-configured", &ScopeParams::new()).await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_buckets() {
        let limiter = RateLimiter::new(true);
        let limit = send_message();

        limiter.acquire(&limit, &channel("A")).await;
        limiter.acquire(&limit, &channel("B")).await;
        let held = limiter.get_bucket(&limit, &channel("B"));

        assert_eq!(limiter.evict_idle(Duration::from_secs(30)), 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        // B is still referenced by `held`
        assert_eq!(limiter.evict_idle(Duration::from_secs(30)), 1);
        assert_eq!(limiter.bucket_count(), 1);

        drop(held);
        assert_eq!(limiter.evict_idle(Duration::from_secs(30)), 1);
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_from_settings_without_routes_file() {
        let settings = RateLimitSettings {
            enabled: false,
            routes_file: None,
        };
        let limiter = RateLimiter::from_settings(&settings).unwrap();

        assert!(!limiter.is_enabled());
        assert!(limiter.routes().is_empty());
    }

    #[test]
    fn test_from_settings_missing_file() {
        let settings = RateLimitSettings {
            enabled: true,
            routes_file: Some(PathBuf::from("/nonexistent/routes.json")),
        };
        let err = RateLimiter::from_settings(&settings).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
