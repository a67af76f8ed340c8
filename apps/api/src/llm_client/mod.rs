//! LLM Client: the single point of entry for all model calls in the service.
//!
//! ARCHITECTURAL RULE: No other module may call a provider API directly.
//! Evaluation code depends on the `LlmProvider` trait only, so tests swap in a
//! scripted provider and production holds an `Arc<dyn LlmProvider>`.
//!
//! One attempt per call. Resilience lives in the evaluators' fallback records,
//! not in retry loops here.
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod testing;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";
const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

// ────────────────────────────────────────────────────────────────────────────
// Provider trait
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Anything that can turn a chat transcript into raw response text.
/// `schema` is a structured-output hint; providers may ignore it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Supports `response_format: json_schema`.
    OpenRouter,
    /// No structured output; the schema is appended to the prompt instead.
    Groq,
}

impl ProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => OPENROUTER_API_URL,
            ProviderKind::Groq => GROQ_API_URL,
        }
    }

    pub fn default_max_tokens(self) -> u32 {
        match self {
            ProviderKind::OpenRouter => 28_000,
            ProviderKind::Groq => 8_000,
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(format!(
                "Unsupported provider '{other}'. Supported: openrouter, groq"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (OpenAI-compatible chat completions)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'static str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// HTTP client for OpenAI-compatible chat-completions providers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }
}

#[async_trait]
impl LlmProvider for LlmClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        let body = build_request_body(&self.settings, messages, schema);
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.settings.timeout)
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        extract_content(&text)
    }
}

/// Builds the provider payload. Groq gets the schema appended to the last user
/// message; OpenRouter gets it as a strict `json_schema` response format.
fn build_request_body<'a>(
    settings: &'a LlmSettings,
    messages: &[ChatMessage],
    schema: Option<&'a Value>,
) -> ChatCompletionRequest<'a> {
    let mut messages = messages.to_vec();
    let mut response_format = None;

    if let Some(schema) = schema {
        match settings.provider {
            ProviderKind::OpenRouter => {
                response_format = Some(ResponseFormat {
                    format_type: "json_schema",
                    json_schema: JsonSchemaFormat {
                        name: "response",
                        strict: true,
                        schema,
                    },
                });
            }
            ProviderKind::Groq => {
                if let Some(last) = messages.last_mut().filter(|m| m.role == ChatRole::User) {
                    last.content.push_str(&format!(
                        "\n\nPlease respond with valid JSON matching this schema: {schema}"
                    ));
                }
            }
        }
    }

    ChatCompletionRequest {
        model: &settings.model,
        messages,
        temperature: TEMPERATURE,
        max_tokens: settings.max_tokens,
        response_format,
    }
}

fn extract_content(body: &str) -> Result<String, LlmError> {
    let envelope: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedEnvelope(e.to_string()))?;

    if let Some(usage) = &envelope.usage {
        debug!(
            "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let content = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedEnvelope("no choices in response".to_string()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(content)
}
