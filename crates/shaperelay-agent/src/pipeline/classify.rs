//! Decide whether an inbound event deserves a response, and in which mode.

use std::fmt;

use shaperelay_core::types::{BotSession, InboundEvent, PlatformEvent};

/// How a message reached the bot. Drives content preparation and the
/// wording of the fallback notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    DirectMessage,
    Mention,
    Reply,
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectMessage => write!(f, "dm"),
            Self::Mention => write!(f, "mention"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Ignore,
    RespondDm,
    RespondMention,
    RespondReply,
    SlashCommand {
        name: String,
        subcommand: Option<String>,
    },
}

impl Action {
    pub fn reply_mode(&self) -> Option<ReplyMode> {
        match self {
            Action::RespondDm => Some(ReplyMode::DirectMessage),
            Action::RespondMention => Some(ReplyMode::Mention),
            Action::RespondReply => Some(ReplyMode::Reply),
            Action::Ignore | Action::SlashCommand { .. } => None,
        }
    }
}

/// Classify an event. Rules apply in order; the first match wins:
///
/// 1. bot-authored → `Ignore`
/// 2. command interaction → `SlashCommand`
/// 3. direct message → `RespondDm`
/// 4. bot mentioned → `RespondMention`
/// 5. reply to one of the bot's messages → `RespondReply`
/// 6. anything else → `Ignore`
pub fn classify(session: &BotSession, event: &PlatformEvent) -> Action {
    match event {
        PlatformEvent::Command(cmd) => {
            if cmd.is_from_bot {
                return Action::Ignore;
            }
            Action::SlashCommand {
                name: cmd.name.clone(),
                subcommand: cmd.subcommand.clone(),
            }
        }
        PlatformEvent::Message(msg) => classify_message(session, msg),
    }
}

fn classify_message(session: &BotSession, msg: &InboundEvent) -> Action {
    if msg.is_from_bot {
        return Action::Ignore;
    }
    if msg.is_direct_message {
        return Action::RespondDm;
    }
    if msg.mentioned_user_ids().any(|id| id == session.user_id) {
        return Action::RespondMention;
    }
    // An unresolvable reference arrives as `None` and falls through to Ignore.
    if msg.replied_to_author_id() == Some(session.user_id.as_str()) {
        return Action::RespondReply;
    }
    Action::Ignore
}

/// Content to forward downstream for a responding action.
///
/// Mentions lose the first token addressing the bot; everything else passes
/// through untouched.
pub fn prepare_content(mode: ReplyMode, session: &BotSession, content: &str) -> String {
    match mode {
        ReplyMode::Mention => strip_bot_mention(content, &session.user_id),
        ReplyMode::DirectMessage | ReplyMode::Reply => content.to_string(),
    }
}

/// Remove the first `<@id>` / `<@!id>` token for `bot_id` and trim the result.
fn strip_bot_mention(content: &str, bot_id: &str) -> String {
    let plain = format!("<@{bot_id}>");
    let nick = format!("<@!{bot_id}>");

    let first = [plain.as_str(), nick.as_str()]
        .into_iter()
        .filter_map(|token| content.find(token).map(|at| (at, token.len())))
        .min_by_key(|(at, _)| *at);

    match first {
        Some((at, len)) => {
            let mut out = String::with_capacity(content.len() - len);
            out.push_str(&content[..at]);
            out.push_str(&content[at + len..]);
            out.trim().to_string()
        }
        None => content.trim().to_string(),
    }
}
