//! Integration test utilities for the client SDK
//!
//! This crate hosts a scripted mock gateway over a real WebSocket so the
//! session can be exercised end to end, plus shared test data.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
