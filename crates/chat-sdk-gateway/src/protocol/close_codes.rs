//! WebSocket close codes and disconnect classification

use serde::{Deserialize, Serialize};

/// Normal closure, sent by `destroy()`
pub const NORMAL_CLOSURE: u16 = 1000;

/// Connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Gateway close codes sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode",
            Self::DecodeError => "Decode error",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSequence => "Invalid sequence",
            Self::RateLimited => "Rate limited",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }

    /// How the client reacts to this close code
    #[must_use]
    pub const fn disposition(self) -> CloseDisposition {
        match self {
            Self::AuthenticationFailed => CloseDisposition::TERMINAL_CLEAR,
            Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseDisposition::TERMINAL,
            Self::InvalidSequence | Self::SessionTimedOut => CloseDisposition::RECONNECT_FRESH,
            _ => CloseDisposition::RECONNECT,
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Reaction to a transport close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseDisposition {
    /// Schedule a reconnect
    pub reconnect: bool,
    /// Forget the session so the next handshake identifies instead of resuming
    pub clear_session: bool,
}

impl CloseDisposition {
    pub const RECONNECT: Self = Self {
        reconnect: true,
        clear_session: false,
    };
    pub const RECONNECT_FRESH: Self = Self {
        reconnect: true,
        clear_session: true,
    };
    pub const TERMINAL: Self = Self {
        reconnect: false,
        clear_session: false,
    };
    pub const TERMINAL_CLEAR: Self = Self {
        reconnect: false,
        clear_session: true,
    };
}

/// Classify a raw close code.
///
/// Standard WebSocket codes (1000, 1001, 1006, ...) and unknown values are
/// reconnect-eligible and keep the session.
#[must_use]
pub fn classify(code: u16) -> CloseDisposition {
    CloseCode::from_u16(code).map_or(CloseDisposition::RECONNECT, CloseCode::disposition)
}

/// Human-readable description for any close code
#[must_use]
pub fn describe(code: u16) -> &'static str {
    match code {
        NORMAL_CLOSURE => "Normal closure",
        1001 => "Going away",
        ABNORMAL_CLOSURE => "Abnormal closure",
        _ => CloseCode::from_u16(code).map_or("Unknown close code", CloseCode::description),
    }
}
