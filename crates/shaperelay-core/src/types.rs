//! Platform-agnostic event and participant types.
//!
//! Ids are opaque strings: the pipeline compares them but never parses them.
//! The Discord adapter is the only place that converts to and from snowflakes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The connected bot's own identity, known only after the gateway is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSession {
    pub user_id: String,
    pub username: String,
}

impl BotSession {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// A user as seen on an inbound event, before any member lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
}

impl UserRef {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            global_name: None,
        }
    }

    pub fn with_global_name(mut self, global_name: impl Into<String>) -> Self {
        self.global_name = Some(global_name.into());
        self
    }
}

/// An inbound chat message. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub id: String,
    pub author: UserRef,
    pub is_from_bot: bool,
    pub channel_id: String,
    /// Present for server messages; used for member nickname lookups.
    pub guild_id: Option<String>,
    pub is_direct_message: bool,
    pub content: String,
    /// Mentioned users in order of appearance, without duplicates.
    pub mentions: Vec<UserRef>,
    /// Author of the referenced message, when the reference could be resolved.
    pub replied_to: Option<UserRef>,
}

impl InboundEvent {
    pub fn mentioned_user_ids(&self) -> impl Iterator<Item = &str> {
        self.mentions.iter().map(|u| u.id.as_str())
    }

    pub fn replied_to_author_id(&self) -> Option<&str> {
        self.replied_to.as_ref().map(|u| u.id.as_str())
    }
}

/// A slash-command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub id: String,
    pub user_id: String,
    pub is_from_bot: bool,
    pub channel_id: String,
    pub name: String,
    pub subcommand: Option<String>,
}

/// Everything the dispatcher can be handed by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Message(InboundEvent),
    Command(CommandEvent),
}

impl PlatformEvent {
    pub fn id(&self) -> &str {
        match self {
            PlatformEvent::Message(m) => &m.id,
            PlatformEvent::Command(c) => &c.id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            PlatformEvent::Message(m) => &m.channel_id,
            PlatformEvent::Command(c) => &c.channel_id,
        }
    }
}

/// Why a participant is part of the conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Author,
    Mentioned,
    RepliedTo,
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Mentioned => write!(f, "mentioned"),
            Self::RepliedTo => write!(f, "replied_to"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub global_name: Option<String>,
    pub role: ParticipantRole,
}

/// Participants relevant to one event: author first, then mentions in order,
/// then the replied-to user. Each id appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParticipantContext {
    participants: Vec<Participant>,
}

impl ParticipantContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the id is already present; the earlier role wins.
    pub fn push(&mut self, participant: Participant) -> bool {
        if self.contains(&participant.id) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }
}
