//! Dispatch event names
//!
//! The closed set of names a subscriber can listen for by name. Dispatches
//! with any other `t` are still delivered on the raw channel.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! event_names {
    ($( $(#[$meta:meta])* $variant:ident => $wire:literal, )+) => {
        /// Dispatch event names
        ///
        /// These are the values of the `t` field of dispatch frames.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum EventName {
            $( $(#[$meta])* $variant, )+
        }

        impl EventName {
            /// Every known event name
            pub const ALL: &'static [EventName] = &[$( Self::$variant, )+];

            /// Wire name of the event
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            /// Parse a wire name; `None` for names outside the known set
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $wire => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

event_names! {
    // Session
    /// Sent after a successful Identify; carries the session id
    Ready => "READY",
    /// Sent after a successful Resume
    Resumed => "RESUMED",

    // Guilds
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildBanAdd => "GUILD_BAN_ADD",
    GuildBanRemove => "GUILD_BAN_REMOVE",
    GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",

    // Members
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    /// Response to a Request Guild Members frame
    GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
    /// Member list updates for a Guild Subscriptions range
    GuildMemberListUpdate => "GUILD_MEMBER_LIST_UPDATE",

    // Channels
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",

    // Threads
    ThreadCreate => "THREAD_CREATE",
    ThreadUpdate => "THREAD_UPDATE",
    ThreadDelete => "THREAD_DELETE",
    ThreadListSync => "THREAD_LIST_SYNC",
    ThreadMemberUpdate => "THREAD_MEMBER_UPDATE",
    ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE",

    // Messages
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageDeleteBulk => "MESSAGE_DELETE_BULK",
    MessageAck => "MESSAGE_ACK",

    // Reactions
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
    MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",

    // Presence
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",

    // Users
    UserUpdate => "USER_UPDATE",
    UserNoteUpdate => "USER_NOTE_UPDATE",
    UserSettingsUpdate => "USER_SETTINGS_UPDATE",
    RelationshipAdd => "RELATIONSHIP_ADD",
    RelationshipRemove => "RELATIONSHIP_REMOVE",

    // Voice and calls
    VoiceStateUpdate => "VOICE_STATE_UPDATE",
    VoiceServerUpdate => "VOICE_SERVER_UPDATE",
    CallCreate => "CALL_CREATE",
    CallUpdate => "CALL_UPDATE",
    CallDelete => "CALL_DELETE",

    // Invites and interactions
    InviteCreate => "INVITE_CREATE",
    InviteDelete => "INVITE_DELETE",
    InteractionCreate => "INTERACTION_CREATE",
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventName> for String {
    fn from(event: EventName) -> Self {
        event.as_str().to_string()
    }
}
