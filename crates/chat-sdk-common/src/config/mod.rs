//! Configuration structs

mod client_config;

pub use client_config::{
    AppSettings, ClientConfig, ClientPropertiesConfig, ConfigError, Environment, GatewayConfig,
    PresenceConfig, RateLimitSettings,
};
