use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use shaperelay_core::config::ShapesConfig;

use crate::provider::{CompletionProvider, ProviderError, RelayReply, RelayRequest, RelayResult};

const CHAT_PATH: &str = "/v1/chat/completions";

/// OpenAI-compatible chat completions client for Shapes.
pub struct ShapesProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ShapesProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| shaperelay_core::config::DEFAULT_PROVIDER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &ShapesConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.api_key.clone(),
            Some(config.base_url.clone()),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }
        } else {
            ProviderError::Http(e)
        }
    }
}

#[async_trait]
impl CompletionProvider for ShapesProvider {
    fn name(&self) -> &str {
        "shapes"
    }

    async fn send(&self, req: &RelayRequest) -> RelayResult {
        let body = build_request_body(req);
        let url = format!("{}{}", self.base_url, CHAT_PATH);
        let started = Instant::now();

        debug!(model = %req.model, user_id = %req.identity.user_id, "sending request to Shapes");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("x-user-id", &req.identity.user_id)
            .header("x-channel-id", &req.identity.channel_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Shapes API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let reply = extract_reply(&text)?;
        Ok(RelayReply {
            text: reply,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn build_request_body(req: &RelayRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model,
        "messages": req.transcript,
    })
}

/// Pull `choices[0].message.content` out of a success body.
fn extract_reply(body: &str) -> Result<String, ProviderError> {
    let api_resp: ApiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    api_resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

// Shapes API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
