use std::sync::{Arc, OnceLock};

use serenity::all::{ActivityData, ShardManager};
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::{Channel, Message, MessageType};
use serenity::model::gateway::Ready;
use serenity::model::user::{OnlineStatus, User};
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use shaperelay_agent::pipeline::Dispatcher;
use shaperelay_core::config::DiscordConfig;
use shaperelay_core::types::{BotSession, InboundEvent, PlatformEvent, UserRef};

use crate::platform::DiscordPlatform;

/// Serenity event handler wired to the relay dispatcher.
pub struct DiscordHandler {
    pub dispatcher: Arc<Dispatcher>,
    pub config: DiscordConfig,
    pub session: OnceLock<BotSession>,
    /// Filled by the adapter once the client exists; used for heartbeat latency.
    pub shard_manager: Arc<OnceLock<Arc<ShardManager>>>,
}

impl DiscordHandler {
    fn platform(&self, ctx: Context) -> DiscordPlatform {
        DiscordPlatform::new(ctx, self.shard_manager.get().cloned())
    }

    fn spawn_dispatch(&self, platform: DiscordPlatform, session: BotSession, event: PlatformEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&session, &platform, &event).await;
            debug!(
                event_id = %event.id(),
                channel_id = %event.channel_id(),
                ?outcome,
                "dispatch finished"
            );
        });
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let session = BotSession::new(ready.user.id.to_string(), ready.user.name.clone());
        if self.session.set(session).is_err() {
            debug!("session already set; keeping the first ready identity");
        }

        // Config-driven presence. Registry serenity 0.12 serializes the
        // presence `since` field in a shape Discord may reject, so the default
        // presence is left to the gateway identify payload.
        if let Some((activity, status)) = presence_override(&self.config) {
            ctx.set_presence(activity, status);
        }

        info!(name = %ready.user.name, "Discord bot connected");

        if self.config.register_commands {
            crate::commands::register_commands(&ctx).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Cheap pre-filter; the classifier applies the same rule.
        if msg.author.bot {
            return;
        }
        let Some(session) = self.session.get().cloned() else {
            return;
        };

        let event = inbound_event(&ctx, &msg).await;
        self.spawn_dispatch(self.platform(ctx), session, PlatformEvent::Message(event));
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(session) = self.session.get().cloned() else {
            return;
        };

        let event = crate::commands::command_event(&command);
        let platform = self.platform(ctx).with_command(command);
        self.spawn_dispatch(platform, session, PlatformEvent::Command(event));
    }
}

fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.to_string(),
        username: user.name.clone(),
        global_name: user.global_name.clone(),
    }
}

/// Translate a serenity message, resolving DM status and the replied-to author.
async fn inbound_event(ctx: &Context, msg: &Message) -> InboundEvent {
    InboundEvent {
        id: msg.id.to_string(),
        author: user_ref(&msg.author),
        is_from_bot: msg.author.bot,
        channel_id: msg.channel_id.to_string(),
        guild_id: msg.guild_id.map(|g| g.to_string()),
        is_direct_message: is_direct_message(ctx, msg).await,
        content: msg.content.clone(),
        mentions: ordered_mentions(&msg.content, msg.mentions.iter().map(user_ref)),
        replied_to: replied_to_author(ctx, msg).await,
    }
}

/// Mentioned users without duplicates, ordered by where their `<@id>` or
/// `<@!id>` token first appears in `content`. Users mentioned without a
/// token (reply pings) keep their relative order at the end.
fn ordered_mentions(content: &str, users: impl IntoIterator<Item = UserRef>) -> Vec<UserRef> {
    let mut mentions: Vec<UserRef> = Vec::new();
    for user in users {
        if !mentions.iter().any(|m| m.id == user.id) {
            mentions.push(user);
        }
    }
    mentions.sort_by_key(|user| token_position(content, &user.id).unwrap_or(usize::MAX));
    mentions
}

fn token_position(content: &str, user_id: &str) -> Option<usize> {
    let plain = content.find(&format!("<@{user_id}>"));
    let nick = content.find(&format!("<@!{user_id}>"));
    plain.into_iter().chain(nick).min()
}

async fn is_direct_message(ctx: &Context, msg: &Message) -> bool {
    match msg.channel_id.to_channel(ctx).await {
        Ok(Channel::Private(_)) => true,
        Ok(_) => false,
        Err(e) => {
            warn!(channel_id = %msg.channel_id, error = %e, "channel lookup failed");
            msg.guild_id.is_none()
        }
    }
}

/// Author of the message being replied to. Fetches the referenced message
/// only when it was not embedded in the event.
async fn replied_to_author(ctx: &Context, msg: &Message) -> Option<UserRef> {
    let embedded = msg.referenced_message.as_deref().map(|m| user_ref(&m.author));

    let reference = msg
        .message_reference
        .as_ref()
        .and_then(|r| r.message_id.map(|id| (r.channel_id, id)));
    let fetched = match reference {
        Some((channel_id, message_id))
            if msg.kind == MessageType::InlineReply && embedded.is_none() =>
        {
            let result = channel_id.message(ctx, message_id).await;
            if let Err(e) = &result {
                warn!(message_id = %msg.id, error = %e, "referenced message fetch failed");
            }
            Some(result.map(|m| user_ref(&m.author)))
        }
        _ => None,
    };

    reply_author(msg.kind, embedded, fetched)
}

/// Decide the replied-to author. Only inline replies count; the embedded
/// reference wins over a fetch, and a failed fetch means "not a reply".
fn reply_author<E>(
    kind: MessageType,
    embedded: Option<UserRef>,
    fetched: Option<Result<UserRef, E>>,
) -> Option<UserRef> {
    if kind != MessageType::InlineReply {
        return None;
    }
    embedded.or_else(|| fetched.and_then(Result::ok))
}

/// Parse a config status string into serenity's `OnlineStatus`.
fn parse_online_status(s: &str) -> OnlineStatus {
    match s.to_lowercase().as_str() {
        "idle" => OnlineStatus::Idle,
        "dnd" | "do_not_disturb" => OnlineStatus::DoNotDisturb,
        "invisible" => OnlineStatus::Invisible,
        _ => OnlineStatus::Online,
    }
}

/// Presence to set on ready, or `None` when the config asks for the default.
fn presence_override(config: &DiscordConfig) -> Option<(Option<ActivityData>, OnlineStatus)> {
    let status = parse_online_status(&config.status);
    let activity = build_activity(config);
    (activity.is_some() || status != OnlineStatus::Online).then_some((activity, status))
}

/// Build an `ActivityData` from the Discord config.
fn build_activity(config: &DiscordConfig) -> Option<ActivityData> {
    let name = config.activity_name.as_deref()?;
    let kind = config.activity_type.as_deref().unwrap_or("playing");
    Some(match kind.to_lowercase().as_str() {
        "listening" => ActivityData::listening(name),
        "watching" => ActivityData::watching(name),
        "competing" => ActivityData::competing(name),
        "custom" => ActivityData::custom(name),
        _ => ActivityData::playing(name),
    })
}
