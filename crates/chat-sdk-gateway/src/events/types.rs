//! Event payloads delivered to subscribers

use super::EventName;
use crate::error::{GatewayResult, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

static NULL: Value = Value::Null;

/// Subscription channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// One named dispatch
    Dispatch(EventName),
    /// Every dispatch, including unknown and ignored names
    Raw,
    /// Transport closed
    Close,
    /// Transport fault
    Error,
    /// State machine transitions
    Debug,
}

impl From<EventName> for Channel {
    fn from(name: EventName) -> Self {
        Self::Dispatch(name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch(name) => f.write_str(name.as_str()),
            Self::Raw => f.write_str("raw"),
            Self::Close => f.write_str("close"),
            Self::Error => f.write_str("error"),
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// A dispatched event with its body left opaque
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    /// Wire name (`t`)
    pub name: String,
    /// Sequence number (`s`)
    pub sequence: Option<u64>,
    /// Body (`d`)
    pub data: Value,
}

impl DispatchEvent {
    /// Known name, if any
    #[must_use]
    pub fn event_name(&self) -> Option<EventName> {
        EventName::parse(&self.name)
    }

    /// Deserialize the body into a typed payload
    pub fn decode<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        Ok(T::deserialize(&self.data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
}

/// Anything a subscriber can receive
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Dispatch(DispatchEvent),
    Close(CloseEvent),
    Error(TransportError),
    Debug(String),
}

impl Event {
    #[must_use]
    pub fn as_dispatch(&self) -> Option<&DispatchEvent> {
        match self {
            Self::Dispatch(dispatch) => Some(dispatch),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_close(&self) -> Option<&CloseEvent> {
        match self {
            Self::Close(close) => Some(close),
            _ => None,
        }
    }

    /// Dispatch body, `Null` for other events
    #[must_use]
    pub fn data(&self) -> &Value {
        match self {
            Self::Dispatch(dispatch) => &dispatch.data,
            _ => &NULL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::protocol::ReadyPayload;
    use serde_json::json;

    fn ready(data: Value) -> DispatchEvent {
        DispatchEvent {
            name: "READY".to_string(),
            sequence: Some(1),
            data,
        }
    }

    #[test]
    fn test_decode_typed_payload() {
        let event = ready(json!({"session_id": "abc", "v": 9}));
        let payload: ReadyPayload = event.decode().unwrap();
        assert_eq!(payload.session_id, "abc");
        assert_eq!(event.event_name(), Some(EventName::Ready));
    }

    #[test]
    fn test_decode_mismatch_is_decode_error() {
        let event = ready(json!({"session_id": 42}));
        let err = event.decode::<ReadyPayload>().unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
