//! # chat-sdk-ratelimit
//!
//! Client-side admission control. Every outbound request waits on the
//! sliding-window bucket for its route (and scope parameters) before it is
//! issued, so the remote rate limits are respected without ever rejecting
//! a caller.

pub mod bucket;
pub mod limiter;
pub mod route;

pub use bucket::Bucket;
pub use limiter::RateLimiter;
pub use route::{RouteLimit, RouteTable, ScopeParams};
