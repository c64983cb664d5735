//! Sliding-window bucket

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Admission timestamps for one rate-limit key.
///
/// At most `limit` admissions fall inside any trailing `window`. Callers that
/// arrive while the bucket is full wait, in arrival order, until the oldest
/// admission leaves the window. The queue lock is held across that wait, so a
/// later caller can never overtake an earlier one.
#[derive(Debug)]
pub struct Bucket {
    key: String,
    limit: usize,
    window: Duration,
    created_at: Instant,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl Bucket {
    /// Create an empty bucket. A zero limit is treated as one.
    pub fn new(key: impl Into<String>, limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            key: key.into(),
            limit,
            window,
            created_at: Instant::now(),
            timestamps: Mutex::new(VecDeque::with_capacity(limit + 1)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until an admission is allowed, then record it.
    ///
    /// Never fails: a full bucket only delays the caller.
    pub async fn acquire(&self) {
        let mut timestamps = self.timestamps.lock().await;

        loop {
            let now = Instant::now();
            prune(&mut timestamps, now, self.window);

            if timestamps.len() < self.limit {
                timestamps.push_back(now);
                trace!(bucket = %self.key, in_window = timestamps.len(), "Admitted");
                return;
            }

            // Non-empty: len >= limit >= 1
            let Some(&oldest) = timestamps.front() else {
                continue;
            };
            let wait = (oldest + self.window).saturating_duration_since(now);
            debug!(
                bucket = %self.key,
                wait_ms = wait.as_millis() as u64,
                "Bucket full, waiting for window to slide"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of admissions currently inside the window
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        let timestamps = self.timestamps.lock().await;
        timestamps
            .iter()
            .filter(|t| **t + self.window > now)
            .count()
    }

    /// Whether the bucket has been quiet for at least `max_idle` (and at
    /// least one full window). A bucket in the middle of an admission is
    /// never idle.
    pub(crate) fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        let Ok(timestamps) = self.timestamps.try_lock() else {
            return false;
        };
        let last_activity = timestamps.back().copied().unwrap_or(self.created_at);
        last_activity + max_idle.max(self.window) <= now
    }
}

/// Drop admissions that have left the window.
///
/// An admission at `t` stops counting at exactly `t + window`.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while timestamps.front().is_some_and(|t| *t + window <= now) {
        timestamps.pop_front();
    }
}
