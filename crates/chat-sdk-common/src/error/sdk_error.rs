//! SDK error types
//!
//! Unified error handling for applications embedding the SDK.

use crate::config::ConfigError;
use std::fmt;

/// SDK-wide error type
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Gateway session destroyed")]
    Destroyed,

    #[error("Timed out: {0}")]
    Timeout(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl SdkError {
    /// Get a stable error code for logs and metrics
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Destroyed => "DESTROYED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if retrying the failed operation could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Timeout(_) | Self::Io(_))
    }

    /// Create a gateway error
    #[must_use]
    pub fn gateway(msg: impl fmt::Display) -> Self {
        Self::Gateway(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;
