//! Participant context: who is who in the conversation.
//!
//! The completion provider only sees one transcript line per event. When the
//! event involves more than one person, the transcript is prefixed with a
//! single line listing every participant so "you", "him" and nicknames can be
//! resolved. Simple one-person exchanges go through untouched.

use tracing::debug;

use shaperelay_core::types::{
    BotSession, InboundEvent, Participant, ParticipantContext, ParticipantRole, UserRef,
};

use crate::pipeline::platform::ChatPlatform;

/// Prefix of the participant line in a rendered transcript.
pub const PARTICIPANTS_PREFIX: &str = "[participants] ";

/// Build the participant context for `event`.
///
/// Order: author, then mentioned users as they appeared, then the replied-to
/// user if not already present. The bot itself is never listed. Nickname
/// lookups are best-effort: a failed lookup falls back to the bare username.
pub async fn build_context<P: ChatPlatform + ?Sized>(
    event: &InboundEvent,
    session: &BotSession,
    platform: &P,
) -> ParticipantContext {
    let mut ctx = ParticipantContext::new();

    let author = resolve(event, &event.author, ParticipantRole::Author, platform).await;
    ctx.push(author);

    for user in &event.mentions {
        if user.id == session.user_id || ctx.contains(&user.id) {
            continue;
        }
        let mentioned = resolve(event, user, ParticipantRole::Mentioned, platform).await;
        ctx.push(mentioned);
    }

    if let Some(user) = &event.replied_to {
        if user.id != session.user_id && !ctx.contains(&user.id) {
            let replied = resolve(event, user, ParticipantRole::RepliedTo, platform).await;
            ctx.push(replied);
        }
    }

    ctx
}

async fn resolve<P: ChatPlatform + ?Sized>(
    event: &InboundEvent,
    user: &UserRef,
    role: ParticipantRole,
    platform: &P,
) -> Participant {
    // A failed lookup falls back to the bare username. A resolved member
    // without a nickname shows as Discord would: global name, then username.
    let display_name = match &event.guild_id {
        Some(guild_id) => match platform.member_display_name(guild_id, &user.id).await {
            Ok(nick) => nick.unwrap_or_else(|| shown_name(user)),
            Err(e) => {
                debug!(event_id = %event.id, user_id = %user.id, error = %e, "member lookup failed");
                user.username.clone()
            }
        },
        None => shown_name(user),
    };

    Participant {
        id: user.id.clone(),
        username: user.username.clone(),
        display_name,
        global_name: user.global_name.clone(),
        role,
    }
}

fn shown_name(user: &UserRef) -> String {
    user.global_name.clone().unwrap_or_else(|| user.username.clone())
}

/// Render the transcript content sent to the provider.
///
/// One participant: `content` unchanged. Two or more: a single
/// `[participants] [...]` JSON line, a newline, then `content`.
pub fn render_transcript(ctx: &ParticipantContext, content: &str) -> String {
    if ctx.len() <= 1 {
        return content.to_string();
    }

    // Serializing plain strings and enums cannot fail.
    let line = serde_json::to_string(ctx).unwrap_or_default();
    format!("{PARTICIPANTS_PREFIX}{line}\n{content}")
}
