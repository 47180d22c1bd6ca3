//! Stateless HTTP transport, grounded on the teacher's
//! `soulbrowser-kernel/src/llm/openai.rs` (`reqwest::Client` built once,
//! one POST per call, status/JSON decoded into the typed response).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;
use wf_core_types::WayfinderError;

use crate::types::{CompletionRequest, CompletionResponse, Role, Usage};
use crate::LlmTransport;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: api_key.into(), timeout: Duration::from_secs(120) }
    }
}

pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, WayfinderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| WayfinderError::DriverError(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmTransport for HttpTransport {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, WayfinderError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            temperature: request.temperature.unwrap_or(0.2),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            response_format: request.response_schema.as_ref().map(|_| ResponseFormat { kind: "json_object".into() }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    WayfinderError::TransportTimeout(self.config.timeout.as_millis() as u64)
                } else {
                    WayfinderError::TransportDisconnect(err.to_string())
                }
            })?;

        if response.status().as_u16() == 429 {
            let text = response.text().await.unwrap_or_default();
            return Err(WayfinderError::TransportRateLimit(text));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_else(|_| "<unavailable>".into());
            warn!(%status, body = %text, "LLM HTTP transport returned non-success status");
            return Err(WayfinderError::TransportDisconnect(format!("http {status}: {text}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| WayfinderError::TransportParseError(err.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| WayfinderError::TransportParseError("response had no choices".into()))?;

        Ok(CompletionResponse {
            content,
            usage: parsed.usage.unwrap_or_default(),
            model: request.model,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&crate::types::Message> for WireMessage {
    fn from(message: &crate::types::Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role: role.to_string(), content: message.content.clone() }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}
