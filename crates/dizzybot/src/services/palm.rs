use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::models::chat::{Example, Message};
use crate::utils::error::GenerationError;

// ===== WIRE FORMAT =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePrompt {
    pub context: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

/// Body of `POST .../models/{model}:generateMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: MessagePrompt,
    pub temperature: f32,
    pub candidate_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Message>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub filters: Vec<ContentFilter>,
    #[serde(default)]
    pub error: Option<RemoteErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentFilter {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: Option<FilterMessage>,
}

/// The provider reports blocked content either as bare text or as a message
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FilterMessage {
    Text(String),
    Message(Message),
}

impl FilterMessage {
    fn content(&self) -> &str {
        match self {
            FilterMessage::Text(text) => text,
            FilterMessage::Message(message) => &message.content,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

impl GenerationResponse {
    /// Pick the reply candidate, surfacing provider errors and filters first
    pub fn into_reply(self) -> Result<Message, GenerationError> {
        if let Some(err) = self.error {
            return Err(GenerationError::Remote {
                code: err.code,
                message: err.message,
                status: err.status,
            });
        }

        if let Some(filter) = self.filters.first() {
            let reason = if filter.reason.is_empty() {
                "unspecified"
            } else {
                filter.reason.as_str()
            };
            let detail = match filter.message.as_ref().map(FilterMessage::content) {
                Some(content) if !content.is_empty() => format!("{}: {}", reason, content),
                _ => reason.to_string(),
            };
            return Err(GenerationError::ContentFiltered(detail));
        }

        self.candidates
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyCandidates)
    }
}

// ===== GENERATOR SEAM =====

/// Anything that can answer a generateMessage request
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate_message(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

// ===== HTTP CLIENT =====

#[derive(Clone)]
pub struct PalmClient {
    client: Client,
    config: LlmConfig,
}

impl PalmClient {
    pub fn new(config: LlmConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            warn!(
                error = %e,
                "Failed to build HTTP client, falling back to one without the {}s timeout",
                timeout.as_secs()
            );
            Client::new()
        });

        Self { client, config }
    }

    fn endpoint(&self) -> Result<Url, GenerationError> {
        let raw = format!(
            "{}/{}/models/{}:generateMessage",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.model
        );
        Url::parse_with_params(&raw, &[("key", self.config.api_key.as_str())])
            .map_err(|e| GenerationError::Transport(format!("invalid endpoint {}: {}", raw, e)))
    }
}

#[async_trait::async_trait]
impl MessageGenerator for PalmClient {
    async fn generate_message(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let start = Instant::now();
        debug!(
            model = %self.config.model,
            messages = request.prompt.messages.len(),
            "Calling generateMessage"
        );

        let response = self
            .client
            .post(self.endpoint()?)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generateMessage responded"
        );

        if !status.is_success() {
            // Error bodies usually carry the structured `error` object
            if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(&body) {
                if parsed.error.is_some() {
                    return Ok(parsed);
                }
            }
            warn!(status = status.as_u16(), "generateMessage failed without error body");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
