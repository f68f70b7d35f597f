//! End-to-end pipeline scenarios against in-memory platform and provider fakes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use shaperelay_agent::health::RelayStats;
use shaperelay_agent::pipeline::{
    fallback_notice, ChatPlatform, DedupLedger, Delivery, Dispatcher, DropReason, Outcome,
    PlatformError,
};
use shaperelay_agent::provider::{
    CompletionProvider, ProviderError, RelayReply, RelayRequest, RelayResult,
};
use shaperelay_core::types::{BotSession, CommandEvent, InboundEvent, PlatformEvent, UserRef};

/// Records every side effect the dispatcher performs.
#[derive(Default)]
struct FakePlatform {
    sent: Mutex<Vec<(String, String)>>,
    ephemeral: Mutex<Vec<String>>,
    typing: AtomicUsize,
    typing_fails: bool,
}

impl FakePlatform {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send_typing(&self, _channel_id: &str) -> Result<(), PlatformError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        if self.typing_fails {
            return Err(PlatformError::Unavailable("no typing here".into()));
        }
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn reply_ephemeral(
        &self,
        _command: &CommandEvent,
        content: &str,
    ) -> Result<(), PlatformError> {
        self.ephemeral.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn member_display_name(
        &self,
        _guild_id: &str,
        _user_id: &str,
    ) -> Result<Option<String>, PlatformError> {
        Err(PlatformError::Unavailable("members intent missing".into()))
    }

    async fn gateway_latency(&self) -> Option<Duration> {
        Some(Duration::from_millis(33))
    }
}

enum Script {
    Reply(&'static str),
    Transport,
    Empty,
}

/// Provider returning a scripted result and capturing every request.
struct FakeProvider {
    script: Script,
    requests: Mutex<Vec<RelayRequest>>,
}

impl FakeProvider {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<RelayRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, req: &RelayRequest) -> RelayResult {
        self.requests.lock().unwrap().push(req.clone());
        match self.script {
            Script::Reply(text) => Ok(RelayReply {
                text: text.to_string(),
                latency_ms: 10,
            }),
            Script::Transport => Err(ProviderError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
            Script::Empty => Err(ProviderError::EmptyResponse),
        }
    }
}

fn dispatcher(provider: Arc<FakeProvider>) -> Dispatcher {
    Dispatcher::new(
        provider,
        "shapesinc/tessa".to_string(),
        DedupLedger::new(Duration::from_secs(3600), 1000),
        Arc::new(RelayStats::new()),
    )
}

fn dm(id: &str, content: &str) -> PlatformEvent {
    PlatformEvent::Message(InboundEvent {
        id: id.into(),
        author: UserRef::new("42", "alice"),
        is_from_bot: false,
        channel_id: "7".into(),
        guild_id: None,
        is_direct_message: true,
        content: content.into(),
        mentions: Vec::new(),
        replied_to: None,
    })
}

fn server_mention(id: &str, content: &str, bot: &BotSession) -> PlatformEvent {
    PlatformEvent::Message(InboundEvent {
        id: id.into(),
        author: UserRef::new("42", "alice"),
        is_from_bot: false,
        channel_id: "7".into(),
        guild_id: Some("900".into()),
        is_direct_message: false,
        content: content.into(),
        mentions: vec![UserRef::new(bot.user_id.clone(), bot.username.clone())],
        replied_to: None,
    })
}

#[tokio::test]
async fn dm_ping_is_relayed_and_answered() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let outcome = dispatcher.dispatch(&session, &platform, &dm("m1", "ping")).await;

    assert_eq!(outcome, Outcome::Delivered(Delivery::Reply));
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "shapesinc/tessa");
    assert_eq!(requests[0].transcript.len(), 1);
    assert_eq!(requests[0].transcript[0].content, "ping");
    assert_eq!(requests[0].identity.user_id, "42");
    assert_eq!(requests[0].identity.channel_id, "7");
    assert_eq!(platform.sent(), vec![("7".to_string(), "pong".to_string())]);
    assert_eq!(platform.typing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bot_authored_events_never_reach_the_provider() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let mut event = dm("m1", "ping");
    if let PlatformEvent::Message(msg) = &mut event {
        msg.is_from_bot = true;
    }

    let outcome = dispatcher.dispatch(&session, &platform, &event).await;
    assert_eq!(outcome, Outcome::Dropped(DropReason::Ignored));
    assert!(provider.requests().is_empty());
    assert!(platform.sent().is_empty());
    assert_eq!(platform.typing.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mention_failure_apologizes_once() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Transport);
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));
    let event = server_mention("m2", "<@1> status?", &session);

    let first = dispatcher.dispatch(&session, &platform, &event).await;
    let retry = dispatcher.dispatch(&session, &platform, &event).await;

    assert_eq!(first, Outcome::Delivered(Delivery::Fallback));
    assert_eq!(retry, Outcome::Dropped(DropReason::Duplicate));
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].transcript[0].content, "status?");
    assert_eq!(
        platform.sent(),
        vec![("7".to_string(), fallback_notice(false).to_string())]
    );
}

#[tokio::test]
async fn empty_provider_reply_sends_nothing() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Empty);
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let outcome = dispatcher.dispatch(&session, &platform, &dm("m3", "hello?")).await;

    assert_eq!(outcome, Outcome::Dropped(DropReason::SilentProvider));
    assert_eq!(provider.requests().len(), 1);
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn unresolved_reply_chain_is_not_relayed() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    // The adapter could not fetch the referenced message, so no replied-to author.
    let event = PlatformEvent::Message(InboundEvent {
        id: "m4".into(),
        author: UserRef::new("42", "alice"),
        is_from_bot: false,
        channel_id: "7".into(),
        guild_id: Some("900".into()),
        is_direct_message: false,
        content: "what did you mean?".into(),
        mentions: Vec::new(),
        replied_to: None,
    });

    let outcome = dispatcher.dispatch(&session, &platform, &event).await;
    assert_eq!(outcome, Outcome::Dropped(DropReason::Ignored));
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn replayed_event_is_not_relayed_twice() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));
    let event = dm("m5", "ping");

    assert_eq!(
        dispatcher.dispatch(&session, &platform, &event).await,
        Outcome::Delivered(Delivery::Reply)
    );
    assert_eq!(
        dispatcher.dispatch(&session, &platform, &event).await,
        Outcome::Dropped(DropReason::Duplicate)
    );
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(platform.sent().len(), 1);
}

#[tokio::test]
async fn typing_failure_does_not_abort() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("still here"));
    let platform = FakePlatform {
        typing_fails: true,
        ..Default::default()
    };
    let dispatcher = dispatcher(Arc::clone(&provider));

    let outcome = dispatcher.dispatch(&session, &platform, &dm("m6", "hi")).await;
    assert_eq!(outcome, Outcome::Delivered(Delivery::Reply));
    assert_eq!(platform.sent()[0].1, "still here");
}

#[tokio::test]
async fn reply_with_other_participants_carries_context_line() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("sure"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let event = PlatformEvent::Message(InboundEvent {
        id: "m7".into(),
        author: UserRef::new("42", "alice"),
        is_from_bot: false,
        channel_id: "7".into(),
        guild_id: Some("900".into()),
        is_direct_message: false,
        content: "<@1> tell <@55> a joke".into(),
        mentions: vec![UserRef::new("1", "relaybot"), UserRef::new("55", "bob")],
        replied_to: None,
    });

    dispatcher.dispatch(&session, &platform, &event).await;

    let content = &provider.requests()[0].transcript[0].content;
    let (prefix, body) = content.split_once('\n').unwrap();
    assert!(prefix.starts_with("[participants] "));
    assert!(prefix.contains("\"username\":\"bob\""));
    // Lookup failed, so bob is shown under his own username.
    assert!(prefix.contains("\"display_name\":\"bob\""));
    assert_eq!(body, "tell <@55> a joke");
}

#[tokio::test]
async fn bare_mention_is_dropped() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let outcome = dispatcher
        .dispatch(&session, &platform, &server_mention("m8", "<@1>", &session))
        .await;
    assert_eq!(outcome, Outcome::Dropped(DropReason::EmptyContent));
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn network_status_answers_privately_without_relay() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let command = PlatformEvent::Command(CommandEvent {
        id: "i1".into(),
        user_id: "42".into(),
        is_from_bot: false,
        channel_id: "7".into(),
        name: "network".into(),
        subcommand: Some("status".into()),
    });

    let outcome = dispatcher.dispatch(&session, &platform, &command).await;
    assert_eq!(outcome, Outcome::Delivered(Delivery::CommandReply));
    assert!(provider.requests().is_empty());
    assert!(platform.sent().is_empty());

    let replies = platform.ephemeral.lock().unwrap().clone();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("Gateway latency: 33ms"));
    assert!(replies[0].contains("Provider `fake`"));

    let again = dispatcher.dispatch(&session, &platform, &command).await;
    assert_eq!(again, Outcome::Dropped(DropReason::Duplicate));
}

#[tokio::test]
async fn unknown_command_gets_ephemeral_notice() {
    let session = BotSession::new("1", "relaybot");
    let provider = FakeProvider::new(Script::Reply("pong"));
    let platform = FakePlatform::default();
    let dispatcher = dispatcher(Arc::clone(&provider));

    let command = PlatformEvent::Command(CommandEvent {
        id: "i2".into(),
        user_id: "42".into(),
        is_from_bot: false,
        channel_id: "7".into(),
        name: "network".into(),
        subcommand: Some("reboot".into()),
    });

    dispatcher.dispatch(&session, &platform, &command).await;
    let replies = platform.ephemeral.lock().unwrap().clone();
    assert_eq!(replies, vec!["Unknown command.".to_string()]);
}
