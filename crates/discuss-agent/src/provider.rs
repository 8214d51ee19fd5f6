use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One chat turn sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Participant name, restricted to `[A-Za-z0-9_-]{1,64}` by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single-shot chat completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Sent ahead of `messages` as a system turn.
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    /// Model that actually answered, as reported by the endpoint.
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// A chat-completion backend (OpenAI or an OpenAI-compatible endpoint).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Label used in logs and error chains.
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint answered {status}: {message}")]
    Api { status: u16, message: String },

    #[error("cannot decode completion response: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
