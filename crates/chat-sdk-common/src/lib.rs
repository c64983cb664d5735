//! # chat-sdk-common
//!
//! Shared utilities for the client SDK: configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, ClientConfig, ClientPropertiesConfig, ConfigError, Environment, GatewayConfig,
    PresenceConfig, RateLimitSettings,
};
pub use error::{SdkError, SdkResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
