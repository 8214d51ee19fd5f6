use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};

const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// OpenAI chat-completions client. Also serves any OpenAI-compatible endpoint
/// through [`OpenAiProvider::compatible`].
pub struct OpenAiProvider {
    client: reqwest::Client,
    label: String,
    api_key: String,
    base_url: String,
    chat_path: String,
    model_override: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: "openai".to_string(),
            api_key,
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            model_override: None,
        }
    }

    /// An OpenAI-compatible endpoint with its own label, path and model.
    pub fn compatible(
        label: String,
        api_key: String,
        base_url: String,
        chat_path: Option<String>,
        model_override: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            label,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_path: chat_path.unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string()),
            model_override,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = self.model_override.as_deref().unwrap_or(&req.model);
        let url = format!("{}{}", self.base_url, self.chat_path);
        debug!(provider = %self.label, model = %model, "requesting chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&build_request_body(req, model))
            .send()
            .await?;

        let resp = check_status(&self.label, resp).await?;
        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(body.into_chat_response())
    }
}

/// Map 429 to [`ProviderError::RateLimited`] and other non-2xx answers to
/// [`ProviderError::Api`].
async fn check_status(
    label: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after_secs * 1000,
        });
    }

    let message = resp.text().await.unwrap_or_default();
    warn!(provider = %label, status = status.as_u16(), body = %message, "chat completion rejected");
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The system prompt goes first as its own turn.
fn build_request_body(req: &ChatRequest, model: &str) -> serde_json::Value {
    let system = Message {
        role: Role::System,
        content: req.system.clone(),
        name: None,
    };
    let messages: Vec<&Message> = std::iter::once(&system).chain(&req.messages).collect();

    serde_json::json!({
        "model": model,
        "messages": messages,
        "max_tokens": req.max_tokens,
    })
}

// chat completions wire format, deserialization only

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

impl ApiResponse {
    fn into_chat_response(self) -> ChatResponse {
        let (content, stop_reason) = match self.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice.finish_reason.unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        ChatResponse {
            content,
            model: self.model,
            tokens_in: self.usage.prompt_tokens,
            tokens_out: self.usage.completion_tokens,
            stop_reason,
        }
    }
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
