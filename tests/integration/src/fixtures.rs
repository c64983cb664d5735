//! Test fixtures and data generators
//!
//! Provides reusable test data for integration tests.

use chat_sdk_ratelimit::RouteTable;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A fresh gateway session id
pub fn session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// MESSAGE_CREATE payload
pub fn message_create(channel_id: &str, content: &str) -> Value {
    let suffix = unique_suffix();
    json!({
        "id": suffix.to_string(),
        "channel_id": channel_id,
        "content": content,
        "author": {
            "id": "1",
            "username": format!("testuser{suffix}"),
        },
    })
}

/// Route limits used by the rate limiting tests
pub const ROUTES_JSON: &str = r#"[
    {"route": "send-message", "limit": 2, "window_ms": 300, "scope_keys": ["channel_id"]},
    {"route": "update-presence", "limit": 2, "window_ms": 300}
]"#;

/// Parsed `ROUTES_JSON`
pub fn routes() -> RouteTable {
    RouteTable::from_json(ROUTES_JSON).expect("fixture routes are valid")
}
