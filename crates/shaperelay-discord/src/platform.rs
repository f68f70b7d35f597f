//! `ChatPlatform` over serenity's context for a single event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::ShardManager;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::CommandInteraction;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::Context;

use shaperelay_agent::pipeline::{ChatPlatform, PlatformError};
use shaperelay_core::types::CommandEvent;

/// Parse an opaque id back into a Discord snowflake.
pub(crate) fn parse_snowflake(raw: &str) -> Result<u64, PlatformError> {
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(PlatformError::InvalidId(raw.to_string())),
        Ok(id) => Ok(id),
    }
}

/// Platform handle built per event. Holds the interaction being answered,
/// when the event is a command.
pub struct DiscordPlatform {
    ctx: Context,
    command: Option<CommandInteraction>,
    shard_manager: Option<Arc<ShardManager>>,
}

impl DiscordPlatform {
    pub fn new(ctx: Context, shard_manager: Option<Arc<ShardManager>>) -> Self {
        Self {
            ctx,
            command: None,
            shard_manager,
        }
    }

    pub fn with_command(mut self, command: CommandInteraction) -> Self {
        self.command = Some(command);
        self
    }
}

fn unavailable(e: serenity::Error) -> PlatformError {
    PlatformError::Unavailable(e.to_string())
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn send_typing(&self, channel_id: &str) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_snowflake(channel_id)?);
        channel
            .broadcast_typing(&self.ctx.http)
            .await
            .map_err(unavailable)
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), PlatformError> {
        let channel = ChannelId::new(parse_snowflake(channel_id)?);
        crate::send::send_reply(&self.ctx.http, channel, content)
            .await
            .map_err(unavailable)
    }

    async fn reply_ephemeral(
        &self,
        command: &CommandEvent,
        content: &str,
    ) -> Result<(), PlatformError> {
        let interaction = self
            .command
            .as_ref()
            .filter(|c| c.id.to_string() == command.id)
            .ok_or_else(|| PlatformError::NotFound(format!("interaction {}", command.id)))?;

        interaction
            .create_response(
                &self.ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(true),
                ),
            )
            .await
            .map_err(unavailable)
    }

    async fn member_display_name(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, PlatformError> {
        let guild = GuildId::new(parse_snowflake(guild_id)?);
        let user = UserId::new(parse_snowflake(user_id)?);
        // Cache first, REST on miss.
        let member = guild.member(&self.ctx, user).await.map_err(unavailable)?;
        Ok(member.nick)
    }

    async fn gateway_latency(&self) -> Option<Duration> {
        let manager = self.shard_manager.as_ref()?;
        let runners = manager.runners.lock().await;
        runners.get(&self.ctx.shard_id).and_then(|runner| runner.latency)
    }
}
