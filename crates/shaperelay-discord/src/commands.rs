//! Discord slash commands: `/network status`.
//!
//! Registration happens in `ready()` when `config.register_commands` is true.
//! Interactions are translated here and answered by the shared dispatcher.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{
    Command, CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType,
};
use serenity::prelude::Context;
use tracing::{info, warn};

use shaperelay_agent::pipeline::status::{NETWORK_COMMAND, STATUS_SUBCOMMAND};
use shaperelay_core::types::CommandEvent;

/// Register global slash commands. Call from `ready()`.
pub async fn register_commands(ctx: &Context) {
    let commands = vec![CreateCommand::new(NETWORK_COMMAND)
        .description("Network diagnostics")
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            STATUS_SUBCOMMAND,
            "Show uptime and latency",
        ))];

    match Command::set_global_commands(&ctx.http, commands).await {
        Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
        Err(e) => warn!(error = %e, "failed to register global slash commands"),
    }
}

/// First subcommand name among the interaction's options, if any.
fn subcommand_name(options: &[CommandDataOption]) -> Option<String> {
    options
        .iter()
        .find(|o| matches!(o.value, CommandDataOptionValue::SubCommand(_)))
        .map(|o| o.name.clone())
}

/// Translate a serenity command interaction into a pipeline event.
pub fn command_event(command: &CommandInteraction) -> CommandEvent {
    CommandEvent {
        id: command.id.to_string(),
        user_id: command.user.id.to_string(),
        is_from_bot: command.user.bot,
        channel_id: command.channel_id.to_string(),
        name: command.data.name.clone(),
        subcommand: subcommand_name(&command.data.options),
    }
}
