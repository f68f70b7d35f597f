//! Platform capability interface consumed by the pipeline.

use std::time::Duration;

use async_trait::async_trait;

use shaperelay_core::types::CommandEvent;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Side effects the dispatcher needs from a chat platform.
///
/// Implemented by the Discord adapter over serenity's REST client, and by
/// in-memory fakes in tests.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Show a typing indicator in `channel_id`. Best-effort.
    async fn send_typing(&self, channel_id: &str) -> Result<(), PlatformError>;

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), PlatformError>;

    /// Respond to a command so only the invoking user sees it.
    async fn reply_ephemeral(
        &self,
        command: &CommandEvent,
        content: &str,
    ) -> Result<(), PlatformError>;

    /// Server nickname for `user_id`, if any. Best-effort.
    async fn member_display_name(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, PlatformError>;

    /// Last measured gateway heartbeat latency.
    async fn gateway_latency(&self) -> Option<Duration>;
}
