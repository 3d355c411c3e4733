//! TextGenerator trait definition.

use parley_types::error::GenerationError;

/// A single prompt pair sent to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens,
        }
    }
}

/// Backend that turns a prompt pair into raw text.
///
/// Uses native async fn in traits (RPITIT). Implementations live in
/// parley-infra (e.g., `HttpGenerator`). Retries belong to the
/// implementation; the gate only sees the final result.
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Model identifier used for tracing attributes.
    fn model(&self) -> &str;

    /// Generate a completion for the request.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
