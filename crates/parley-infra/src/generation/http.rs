//! HttpGenerator -- concrete [`TextGenerator`] over HTTP.
//!
//! Speaks either the Ollama native chat API (`/api/chat`, thinking
//! disabled) or an OpenAI-compatible chat completions API
//! (`/v1/chat/completions`). Each `generate` makes up to
//! `1 + max_retries` attempts before reporting the last error.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed
//! when building the `Authorization` header.

use std::time::Duration;

use parley_core::generation::{GenerationRequest, TextGenerator};
use parley_types::config::{ApiStyle, GenerationConfig};
use parley_types::error::GenerationError;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use super::types::{
    ChatMessage, OllamaChatRequest, OllamaChatResponse, OllamaOptions, OpenAiChatRequest,
    OpenAiChatResponse,
};

/// Error bodies are cut to this many characters in messages.
const ERROR_BODY_LIMIT: usize = 200;

pub struct HttpGenerator {
    client: reqwest::Client,
    api_style: ApiStyle,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    temperature: f64,
    max_retries: u32,
    retry_delay: Duration,
}

// No Debug derive: keeps the key out of any formatted output.

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_style: config.api_style,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| SecretString::from(k.to_string())),
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Base delay between attempts. Rate-limited attempts back off
    /// proportionally to the attempt number.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        match self.api_style {
            ApiStyle::OllamaNative => format!("{}/api/chat", self.base_url),
            ApiStyle::OpenAi => format!("{}/v1/chat/completions", self.base_url),
        }
    }

    fn body(&self, request: &GenerationRequest) -> Result<serde_json::Value, GenerationError> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ];
        let body = match self.api_style {
            ApiStyle::OllamaNative => serde_json::to_value(OllamaChatRequest {
                model: &self.model,
                messages,
                think: false,
                stream: false,
                options: OllamaOptions {
                    num_predict: request.max_tokens,
                    temperature: self.temperature,
                },
            }),
            ApiStyle::OpenAi => serde_json::to_value(OpenAiChatRequest {
                model: &self.model,
                messages,
                max_tokens: request.max_tokens,
                temperature: self.temperature,
            }),
        };
        body.map_err(|e| GenerationError::Deserialization(e.to_string()))
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json")
            .json(&self.body(request)?);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Provider {
                    message: format!("HTTP request failed: {e}"),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_body, retry_after_ms));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Deserialization(format!("failed to read response: {e}")))?;
        extract_content(self.api_style, &body)
    }

    fn backoff(&self, attempt: u32, error: &GenerationError) -> Duration {
        match error {
            GenerationError::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis(*ms),
            GenerationError::RateLimited { .. } => self.retry_delay * 2 * (attempt + 1),
            _ => self.retry_delay,
        }
    }
}

impl TextGenerator for HttpGenerator {
    fn name(&self) -> &str {
        match self.api_style {
            ApiStyle::OllamaNative => "ollama",
            ApiStyle::OpenAi => "openai_compat",
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(GenerationError::AuthenticationFailed) => {
                    return Err(GenerationError::AuthenticationFailed);
                }
                Err(e) if attempt < self.max_retries => {
                    let wait = self.backoff(attempt, &e);
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "generation attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn status_error(status: StatusCode, body: &str, retry_after_ms: Option<u64>) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::AuthenticationFailed,
        429 => GenerationError::RateLimited { retry_after_ms },
        _ => GenerationError::Provider {
            message: format!("HTTP {status}: {}", truncate(body)),
        },
    }
}

/// `Retry-After` in delta-seconds form, as milliseconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

/// Pull the reply text out of a response body. Empty content is an error
/// so the caller retries.
fn extract_content(style: ApiStyle, body: &str) -> Result<String, GenerationError> {
    let (content, error) = match style {
        ApiStyle::OllamaNative => {
            let parsed: OllamaChatResponse = serde_json::from_str(body)
                .map_err(|e| GenerationError::Deserialization(e.to_string()))?;
            (parsed.message.and_then(|m| m.content), parsed.error)
        }
        ApiStyle::OpenAi => {
            let parsed: OpenAiChatResponse = serde_json::from_str(body)
                .map_err(|e| GenerationError::Deserialization(e.to_string()))?;
            let content = parsed.choices.into_iter().next().and_then(|c| c.message.content);
            (content, parsed.error)
        }
    };

    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => match error {
            Some(error) => Err(GenerationError::Provider {
                message: format!("API error: {}", truncate(&error.to_string())),
            }),
            None => Err(GenerationError::EmptyResponse),
        },
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(ERROR_BODY_LIMIT).collect()
}
