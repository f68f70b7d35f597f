use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single role-tagged entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// Who the provider should attribute the request to. Sent as
/// `X-User-Id` / `X-Channel-Id` so the provider can keep its own per-user,
/// per-channel memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayIdentity {
    pub user_id: String,
    pub channel_id: String,
}

/// Request to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub model: String,
    pub transcript: Vec<Message>,
    pub identity: RelayIdentity,
}

/// Successful provider reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReply {
    pub text: String,
    pub latency_ms: u64,
}

pub type RelayResult = Result<RelayReply, ProviderError>;

/// Completion provider interface. One call per relayed event.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging and the status report.
    fn name(&self) -> &str;

    async fn send(&self, req: &RelayRequest) -> RelayResult;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider returned no reply content")]
    EmptyResponse,

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether the user should see an apology for this failure.
    ///
    /// An unreachable or failing provider gets a fallback notice. A provider
    /// that answered successfully but said nothing does not.
    pub fn warrants_fallback(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::Timeout { .. } | ProviderError::Api { .. } => {
                true
            }
            ProviderError::EmptyResponse | ProviderError::Malformed(_) => false,
        }
    }
}
