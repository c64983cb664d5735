//! Gateway error types

use chat_sdk_common::SdkError;
use std::time::Duration;

/// Transport-level failures
///
/// `Clone` so one failure can be fanned out to every `error` subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport I/O error: {0}")]
    Io(String),

    #[error("Transport closed")]
    Closed,
}

/// Gateway session errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No matching event arrived in time
    #[error("Timed out after {timeout:?} waiting for {event}")]
    WaitTimeout { event: String, timeout: Duration },

    #[error("Gateway session destroyed")]
    Destroyed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

impl From<GatewayError> for SdkError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::WaitTimeout { .. } => Self::Timeout(err.to_string()),
            GatewayError::Destroyed => Self::Destroyed,
            GatewayError::Transport(e) => Self::gateway(e),
            GatewayError::Decode(e) => Self::Serialization(e),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
