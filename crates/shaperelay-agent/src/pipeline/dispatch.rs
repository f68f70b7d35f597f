//! Per-event orchestration.
//!
//! `Received → Classified → Deduplicated → TypingSignaled → ContextBuilt →
//! Relayed → Delivered`, with a short-circuit to `Dropped` at every gate.
//! Slash commands share classification and dedup, then answer from local
//! stats without touching the provider.

use std::sync::Arc;

use tracing::{debug, info, warn};

use shaperelay_core::types::{BotSession, CommandEvent, InboundEvent, PlatformEvent};

use crate::health::RelayStats;
use crate::pipeline::classify::{classify, prepare_content, Action, ReplyMode};
use crate::pipeline::context::{build_context, render_transcript};
use crate::pipeline::dedup::DedupLedger;
use crate::pipeline::platform::ChatPlatform;
use crate::pipeline::status::{render_status, NETWORK_COMMAND, STATUS_SUBCOMMAND};
use crate::provider::{CompletionProvider, Message, ProviderError, RelayIdentity, RelayRequest};

const UNKNOWN_COMMAND: &str = "Unknown command.";

/// What the user ended up seeing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reply,
    Fallback,
    CommandReply,
}

/// Why nothing (further) was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Classifier said the event is not for us.
    Ignored,
    /// Nothing left to relay after mention stripping.
    EmptyContent,
    /// Event id already admitted once.
    Duplicate,
    /// Provider answered without content; no apology is sent for this.
    SilentProvider,
    /// Fallback notice for this event id was already sent.
    FallbackAlreadySent,
    /// The platform rejected the outgoing message.
    DeliveryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered(Delivery),
    Dropped(DropReason),
}

/// Apology sent when the provider cannot be reached.
pub fn fallback_notice(is_direct_message: bool) -> &'static str {
    if is_direct_message {
        "Sorry, I had a little hiccup in your DMs."
    } else {
        "Sorry, I had a little hiccup talking in the server."
    }
}

/// Routes platform events through the relay pipeline.
pub struct Dispatcher {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    ledger: DedupLedger,
    stats: Arc<RelayStats>,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        model: String,
        ledger: DedupLedger,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            provider,
            model,
            ledger,
            stats,
        }
    }

    /// Handle one platform event to completion.
    pub async fn dispatch<P: ChatPlatform + ?Sized>(
        &self,
        session: &BotSession,
        platform: &P,
        event: &PlatformEvent,
    ) -> Outcome {
        let action = classify(session, event);

        match (event, action) {
            (_, Action::Ignore) => Outcome::Dropped(DropReason::Ignored),
            (PlatformEvent::Command(cmd), Action::SlashCommand { name, subcommand }) => {
                self.handle_command(platform, cmd, &name, subcommand.as_deref())
                    .await
            }
            (PlatformEvent::Message(msg), action) => match action.reply_mode() {
                Some(mode) => self.handle_message(session, platform, msg, mode).await,
                None => Outcome::Dropped(DropReason::Ignored),
            },
            (PlatformEvent::Command(_), _) => Outcome::Dropped(DropReason::Ignored),
        }
    }

    async fn handle_message<P: ChatPlatform + ?Sized>(
        &self,
        session: &BotSession,
        platform: &P,
        msg: &InboundEvent,
        mode: ReplyMode,
    ) -> Outcome {
        let content = prepare_content(mode, session, &msg.content);
        if content.trim().is_empty() {
            debug!(event_id = %msg.id, %mode, "nothing to relay after mention strip");
            return Outcome::Dropped(DropReason::EmptyContent);
        }

        if !self.ledger.should_process(&msg.id) {
            debug!(event_id = %msg.id, %mode, "duplicate event dropped");
            return Outcome::Dropped(DropReason::Duplicate);
        }
        self.stats.record_event();

        if let Err(e) = platform.send_typing(&msg.channel_id).await {
            debug!(event_id = %msg.id, error = %e, "typing indicator failed");
        }

        let participants = build_context(msg, session, platform).await;
        let request = RelayRequest {
            model: self.model.clone(),
            transcript: vec![Message::user(render_transcript(&participants, &content))],
            identity: RelayIdentity {
                user_id: msg.author.id.clone(),
                channel_id: msg.channel_id.clone(),
            },
        };

        info!(
            event_id = %msg.id,
            %mode,
            channel_id = %msg.channel_id,
            participants = participants.len(),
            "relaying message"
        );

        match self.provider.send(&request).await {
            Ok(reply) => {
                self.stats.record_success(reply.latency_ms);
                match platform.send_message(&msg.channel_id, &reply.text).await {
                    Ok(()) => {
                        self.stats.record_reply();
                        Outcome::Delivered(Delivery::Reply)
                    }
                    Err(e) => {
                        warn!(event_id = %msg.id, %mode, error = %e, "reply delivery failed");
                        Outcome::Dropped(DropReason::DeliveryFailed)
                    }
                }
            }
            Err(e) => {
                self.stats.record_error(&e);
                self.handle_relay_error(platform, msg, mode, &e).await
            }
        }
    }

    async fn handle_relay_error<P: ChatPlatform + ?Sized>(
        &self,
        platform: &P,
        msg: &InboundEvent,
        mode: ReplyMode,
        error: &ProviderError,
    ) -> Outcome {
        if !error.warrants_fallback() {
            warn!(event_id = %msg.id, %mode, error = %error, "provider returned nothing to relay");
            return Outcome::Dropped(DropReason::SilentProvider);
        }

        warn!(event_id = %msg.id, %mode, error = %error, "relay failed");

        if !self.ledger.should_notify_error(&msg.id) {
            return Outcome::Dropped(DropReason::FallbackAlreadySent);
        }

        let notice = fallback_notice(msg.is_direct_message);
        match platform.send_message(&msg.channel_id, notice).await {
            Ok(()) => {
                self.stats.record_fallback();
                Outcome::Delivered(Delivery::Fallback)
            }
            Err(e) => {
                warn!(event_id = %msg.id, %mode, error = %e, "fallback delivery failed");
                Outcome::Dropped(DropReason::DeliveryFailed)
            }
        }
    }

    async fn handle_command<P: ChatPlatform + ?Sized>(
        &self,
        platform: &P,
        cmd: &CommandEvent,
        name: &str,
        subcommand: Option<&str>,
    ) -> Outcome {
        if !self.ledger.should_process(&cmd.id) {
            debug!(event_id = %cmd.id, command = %name, "duplicate interaction dropped");
            return Outcome::Dropped(DropReason::Duplicate);
        }
        self.stats.record_event();

        let response = if name == NETWORK_COMMAND && subcommand == Some(STATUS_SUBCOMMAND) {
            let latency = platform.gateway_latency().await;
            render_status(self.provider.name(), &self.stats.snapshot(), latency)
        } else {
            UNKNOWN_COMMAND.to_string()
        };

        info!(event_id = %cmd.id, command = %name, subcommand = ?subcommand, "answering command");

        match platform.reply_ephemeral(cmd, &response).await {
            Ok(()) => Outcome::Delivered(Delivery::CommandReply),
            Err(e) => {
                warn!(event_id = %cmd.id, command = %name, error = %e, "command reply failed");
                Outcome::Dropped(DropReason::DeliveryFailed)
            }
        }
    }
}
