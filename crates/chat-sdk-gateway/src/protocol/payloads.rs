//! Frame payload definitions
//!
//! Client payloads are serialized into `d`; the few server payloads the
//! session itself reads (Hello, READY) are deserialized from it. Dispatch
//! bodies are otherwise left opaque.

use chat_sdk_common::{ClientPropertiesConfig, PresenceConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// The part of the READY dispatch the session keeps
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: ClientProperties,
    pub presence: PresencePayload,
    /// Dispatch names the server may skip sending
    #[serde(default)]
    pub ignored_events: Vec<String>,
}

/// Client metadata announced in Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl From<&ClientPropertiesConfig> for ClientProperties {
    fn from(config: &ClientPropertiesConfig) -> Self {
        Self {
            os: config.os.clone(),
            browser: config.browser.clone(),
            device: config.device.clone(),
        }
    }
}

/// Payload for op 3 (Presence Update), also embedded in Identify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// online, idle, dnd, invisible or offline
    pub status: String,
    /// Unix time in milliseconds since the client went idle
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<Value>,
    pub afk: bool,
}

impl PresencePayload {
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            since: None,
            activities: Vec::new(),
            afk: false,
        }
    }

    #[must_use]
    pub fn with_afk(mut self, afk: bool) -> Self {
        self.afk = afk;
        self
    }

    #[must_use]
    pub fn with_activity(mut self, activity: Value) -> Self {
        self.activities.push(activity);
        self
    }
}

impl From<&PresenceConfig> for PresencePayload {
    fn from(config: &PresenceConfig) -> Self {
        Self::new(config.status.clone()).with_afk(config.afk)
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: String,
    /// Username prefix; empty requests everyone
    #[serde(default)]
    pub query: String,
    /// Maximum members to return, 0 for no limit
    #[serde(default)]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub presences: bool,
}

impl RequestGuildMembersPayload {
    /// Request every member of a guild
    #[must_use]
    pub fn all(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            query: String::new(),
            limit: 0,
            user_ids: None,
            presences: false,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>, limit: u32) -> Self {
        self.query = query.into();
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_user_ids(mut self, user_ids: Vec<String>) -> Self {
        self.user_ids = Some(user_ids);
        self
    }
}

/// Payload for op 4 (Voice State Update)
///
/// A `None` channel leaves voice; it is sent as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    #[serde(default)]
    pub self_video: bool,
}

impl VoiceStatePayload {
    /// Join (or move to) a voice channel
    #[must_use]
    pub fn join(guild_id: Option<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id,
            channel_id: Some(channel_id.into()),
            self_mute: false,
            self_deaf: false,
            self_video: false,
        }
    }

    /// Leave voice in a guild (or in private calls when `guild_id` is `None`)
    #[must_use]
    pub fn leave(guild_id: Option<String>) -> Self {
        Self {
            guild_id,
            channel_id: None,
            self_mute: false,
            self_deaf: false,
            self_video: false,
        }
    }
}

/// Payload for op 13 (Call Connect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConnectPayload {
    pub channel_id: String,
}

/// Payload for op 14 (Guild Subscriptions)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildSubscriptionsPayload {
    pub guild_id: String,
    #[serde(default)]
    pub typing: bool,
    #[serde(default)]
    pub activities: bool,
    #[serde(default)]
    pub threads: bool,
    /// Member list ranges per channel, as `[start, end]` pairs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, Vec<(u32, u32)>>,
}

impl GuildSubscriptionsPayload {
    #[must_use]
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            typing: true,
            activities: true,
            threads: true,
            channels: BTreeMap::new(),
        }
    }

    /// Subscribe to a member list range of a channel
    #[must_use]
    pub fn with_channel_range(mut self, channel_id: impl Into<String>, start: u32, end: u32) -> Self {
        self.channels
            .entry(channel_id.into())
            .or_default()
            .push((start, end));
        self
    }
}
