//! Gateway protocol definitions
//!
//! Op codes, frame format, payloads and close codes, plus the pure
//! close-reason classifier.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{
    classify, describe, CloseCode, CloseDisposition, ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    CallConnectPayload, ClientProperties, GuildSubscriptionsPayload, HelloPayload,
    IdentifyPayload, PresencePayload, ReadyPayload, RequestGuildMembersPayload, ResumePayload,
    VoiceStatePayload,
};
