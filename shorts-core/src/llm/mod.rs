pub mod payload;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::TextSection;
use crate::gemini::{GenerateContentRequest, GenerateContentResponse, API_KEY_HEADER};

pub use payload::{extract_json_block, parse_payload, TextPayload, RAW_RESPONSE_KEY};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("text service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("text service returned no text")]
    EmptyResponse,
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub system_instruction: String,
    pub contents: String,
}

impl TextRequest {
    pub fn new(system_instruction: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            contents: contents.into(),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: TextRequest) -> LlmResult<String>;
}

pub struct GeminiTextClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiTextClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTextClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl GeminiTextClient {
    pub fn new(config: &TextSection, api_key: impl Into<String>) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                config.model
            ),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiTextClient {
    async fn generate(&self, request: TextRequest) -> LlmResult<String> {
        let body = GenerateContentRequest::user_text(request.contents)
            .with_system_instruction(request.system_instruction);
        debug!(target: "llm", endpoint = %self.endpoint, "sending generateContent request");
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)?;
        parsed.text().ok_or(LlmError::EmptyResponse)
    }
}
