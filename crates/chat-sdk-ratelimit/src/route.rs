//! Route limit definitions
//!
//! The route table is static, externally maintained data: each entry names a
//! logical route, how many admissions it allows per window, and which call
//! parameters split it into independent buckets.

use chat_sdk_common::SdkResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Separator between the route name and scoped parameter values in a bucket key
const KEY_SEPARATOR: char = ':';

/// Limit for one logical route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLimit {
    /// Route name (e.g. "send-message")
    pub route: String,
    /// Maximum admissions per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Parameters whose values select independent buckets
    #[serde(default)]
    pub scope_keys: Vec<String>,
}

impl RouteLimit {
    /// Create an unscoped route limit
    ///
    /// A zero limit could never admit anything, so it is clamped to one.
    #[must_use]
    pub fn new(route: impl Into<String>, limit: u32, window: Duration) -> Self {
        Self {
            route: route.into(),
            limit: limit.max(1),
            window_ms: window.as_millis() as u64,
            scope_keys: Vec::new(),
        }
    }

    /// Scope the route by the given parameter names
    #[must_use]
    pub fn scoped_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Window length
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Limit as enforced (deserialized zero limits are clamped too)
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.max(1)
    }

    /// Compute the bucket key for a call
    ///
    /// Only parameters listed in `scope_keys` participate, in `scope_keys`
    /// order. A scope key missing from `params` contributes an empty value.
    #[must_use]
    pub fn bucket_key(&self, params: &ScopeParams) -> String {
        let mut key = self.route.clone();
        for scope_key in &self.scope_keys {
            key.push(KEY_SEPARATOR);
            key.push_str(params.get(scope_key).unwrap_or_default());
        }
        key
    }
}

/// Call parameters used to scope a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeParams(BTreeMap<String, String>);

impl ScopeParams {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a parameter value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ScopeParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Route name to limit lookup table
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteLimit>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route, returning the limit it replaced
    pub fn insert(&mut self, limit: RouteLimit) -> Option<RouteLimit> {
        self.routes.insert(limit.route.clone(), limit)
    }

    #[must_use]
    pub fn get(&self, route: &str) -> Option<&RouteLimit> {
        self.routes.get(route)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over all routes
    pub fn iter(&self) -> impl Iterator<Item = &RouteLimit> {
        self.routes.values()
    }

    /// Parse a JSON array of route limits
    pub fn from_json(json: &str) -> SdkResult<Self> {
        let limits: Vec<RouteLimit> = serde_json::from_str(json)?;
        Ok(limits.into_iter().collect())
    }

    /// Load a JSON array of route limits from disk
    pub fn from_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl FromIterator<RouteLimit> for RouteTable {
    fn from_iter<T: IntoIterator<Item = RouteLimit>>(iter: T) -> Self {
        let mut table = Self::new();
        for limit in iter {
            table.insert(limit);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscoped_route_has_single_key() {
        let limit = RouteLimit::new("get-gateway", 10, Duration::from_secs(1));
        let a = limit.bucket_key(&ScopeParams::new());
        let b = limit.bucket_key(&ScopeParams::new().with("channel_id", "1"));

        assert_eq!(a, "get-gateway");
        assert_eq!(a, b);
    }

    #[test]
    fn test_scoped_key_uses_only_scope_params() {
        let limit = RouteLimit::new("send-message", 5, Duration::from_secs(5))
            .scoped_by(["channel_id"]);

        let a = limit.bucket_key(&ScopeParams::new().with("channel_id", "A").with("nonce", "1"));
        let a2 = limit.bucket_key(&ScopeParams::new().with("channel_id", "A").with("nonce", "2"));
        let b = limit.bucket_key(&ScopeParams::new().with("channel_id", "B"));

        assert_eq!(a, "send-message:A");
        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_scope_key_order_follows_config() {
        let limit = RouteLimit::new("add-reaction", 1, Duration::from_millis(250))
            .scoped_by(["channel_id", "message_id"]);
        let params: ScopeParams = [("message_id", "m"), ("channel_id", "c")].into_iter().collect();

        assert_eq!(limit.bucket_key(&params), "add-reaction:c:m");
    }

    #[test]
    fn test_missing_scope_value() {
        let limit = RouteLimit::new("send-message", 5, Duration::from_secs(5))
            .scoped_by(["channel_id"]);

        assert_eq!(limit.bucket_key(&ScopeParams::new()), "send-message:");
    }

    #[test]
    fn test_zero_limit_clamped() {
        let limit = RouteLimit::new("r", 0, Duration::from_secs(1));
        assert_eq!(limit.limit, 1);

        let parsed: RouteLimit =
            serde_json::from_str(r#"{"route":"r","limit":0,"window_ms":1000}"#).unwrap();
        assert_eq!(parsed.effective_limit(), 1);
        assert!(parsed.scope_keys.is_empty());
    }

    #[test]
    fn test_route_table_from_json() {
        let table = RouteTable::from_json(
            r#"[
                {"route": "send-message", "limit": 5, "window_ms": 5000, "scope_keys": ["channel_id"]},
                {"route": "get-gateway", "limit": 2, "window_ms": 1000}
            ]"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let send = table.get("send-message").unwrap();
        assert_eq!(send.window(), Duration::from_secs(5));
        assert_eq!(send.scope_keys, vec!["channel_id".to_string()]);
        assert!(table.get("unknown").is_none());
    }

    #[test]
    fn test_route_table_invalid_json() {
        assert!(RouteTable::from_json("{not json").is_err());
    }
}
