//! Gateway frame format

use super::{
    CallConnectPayload, GuildSubscriptionsPayload, HelloPayload, IdentifyPayload, OpCode,
    PresencePayload, ReadyPayload, RequestGuildMembersPayload, ResumePayload, VoiceStatePayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Gateway frame
///
/// Every frame in either direction has this `{ op, d, s, t }` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Payload; `null` when the op carries none
    #[serde(default)]
    pub d: Value,

    /// Sequence number (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn with_payload(op: OpCode, payload: impl Serialize) -> Self {
        Self {
            op,
            d: serde_json::to_value(payload).unwrap_or_default(),
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Heartbeat (op=1) carrying the last sequence seen, or `null`
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: last_sequence.map_or(Value::Null, Value::from),
            s: None,
            t: None,
        }
    }

    /// Identify (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::with_payload(OpCode::Identify, payload)
    }

    /// Presence Update (op=3)
    #[must_use]
    pub fn presence_update(payload: &PresencePayload) -> Self {
        Self::with_payload(OpCode::PresenceUpdate, payload)
    }

    /// Voice State Update (op=4)
    #[must_use]
    pub fn voice_state_update(payload: &VoiceStatePayload) -> Self {
        Self::with_payload(OpCode::VoiceStateUpdate, payload)
    }

    /// Resume (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::with_payload(OpCode::Resume, payload)
    }

    /// Request Guild Members (op=8)
    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Self {
        Self::with_payload(OpCode::RequestGuildMembers, payload)
    }

    /// Call Connect (op=13)
    #[must_use]
    pub fn call_connect(payload: &CallConnectPayload) -> Self {
        Self::with_payload(OpCode::CallConnect, payload)
    }

    /// Guild Subscriptions (op=14)
    #[must_use]
    pub fn guild_subscriptions(payload: &GuildSubscriptionsPayload) -> Self {
        Self::with_payload(OpCode::GuildSubscriptions, payload)
    }

    // === Server Messages ===
    //
    // The client never sends these; they exist for mock servers and tests.

    /// Dispatch (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_name.into()),
        }
    }

    /// Hello (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: Duration) -> Self {
        Self::with_payload(
            OpCode::Hello,
            HelloPayload {
                heartbeat_interval: heartbeat_interval.as_millis() as u64,
            },
        )
    }

    /// Heartbeat ACK (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck,
            d: Value::Null,
            s: None,
            t: None,
        }
    }

    /// Reconnect request (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            op: OpCode::Reconnect,
            d: Value::Null,
            s: None,
            t: None,
        }
    }

    /// Invalid Session (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self {
            op: OpCode::InvalidSession,
            d: Value::Bool(resumable),
            s: None,
            t: None,
        }
    }

    // === Accessors ===

    /// Heartbeat interval of a Hello frame
    #[must_use]
    pub fn hello_interval(&self) -> Option<Duration> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value::<HelloPayload>(self.d.clone())
            .ok()
            .map(|hello| Duration::from_millis(hello.heartbeat_interval))
    }

    /// Session id of a READY dispatch
    #[must_use]
    pub fn ready_session_id(&self) -> Option<String> {
        if self.op != OpCode::Dispatch || self.t.as_deref() != Some("READY") {
            return None;
        }
        serde_json::from_value::<ReadyPayload>(self.d.clone())
            .ok()
            .map(|ready| ready.session_id)
    }

    /// Whether an Invalid Session frame allows resuming. Anything but `true` does not.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.op == OpCode::InvalidSession && self.d.as_bool().unwrap_or(false)
    }

    /// Sequence requested by a server heartbeat or carried by a client one
    #[must_use]
    pub fn heartbeat_sequence(&self) -> Option<u64> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        self.d.as_u64()
    }

    /// Deserialize the payload into a concrete type
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.d)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "{} {t} #{s}", self.op),
            (Some(t), None) => write!(f, "{} {t}", self.op),
            _ => write!(f, "{}", self.op),
        }
    }
}
