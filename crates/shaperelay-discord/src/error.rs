/// Failures that stop the Discord side of the relay from starting.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Discord client error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("discord.bot_token is empty; set it in the config or DISCORD_BOT_TOKEN")]
    NoToken,
}
