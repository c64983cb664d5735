//! Reconnect backoff policy
//!
//! `min(2^(attempt-1) * base, 60s)` plus up to 30% additive jitter.

use rand::Rng;
use std::time::Duration;

/// Upper bound on the un-jittered delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Largest jitter as a fraction of the un-jittered delay
pub const MAX_JITTER_RATIO: f64 = 0.3;

/// Un-jittered delay before reconnect attempt `attempt` (1-based)
#[must_use]
pub fn base_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Jittered delay before reconnect attempt `attempt`
#[must_use]
pub fn reconnect_delay(attempt: u32, base: Duration) -> Duration {
    reconnect_delay_with(attempt, base, &mut rand::thread_rng())
}

/// Jittered delay using a caller-supplied random source
pub fn reconnect_delay_with<R: Rng + ?Sized>(attempt: u32, base: Duration, rng: &mut R) -> Duration {
    let delay = base_delay(attempt, base);
    let jitter = delay.mul_f64(rng.gen_range(0.0..=MAX_JITTER_RATIO));
    delay + jitter
}

/// Random offset in `[0, interval)` for the first heartbeat
#[must_use]
pub fn first_heartbeat_delay(interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    interval.mul_f64(rand::thread_rng().gen_range(0.0..1.0))
}
