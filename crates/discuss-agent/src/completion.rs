//! Completion capability consumed by the relay.
//!
//! The relay only knows [`CompletionProvider`]; [`LlmCompletionProvider`] is the
//! production implementation that frames the prompt and calls an
//! [`LlmProvider`] (usually a [`ProviderRouter`](crate::router::ProviderRouter)).

use async_trait::async_trait;
use discuss_core::Channel;
use thiserror::Error;
use tracing::{debug, info};

use crate::prompt::system_prompt;
use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};

/// Everything the provider needs to answer one inbound prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub channel: Channel,
    /// Sender address on the channel; identifies the end user.
    pub channel_id: String,
    pub display_name: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The backing LLM call failed.
    #[error("completion via {provider} failed")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// The call succeeded but produced no usable text.
    #[error("completion returned no text")]
    Empty,
}

/// Turns a prompt into generated text.
///
/// Implementations may retry internally; callers must not.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CompletionError>;
}

/// [`CompletionProvider`] backed by a chat-completion [`LlmProvider`].
pub struct LlmCompletionProvider {
    provider: Box<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmCompletionProvider {
    pub fn new(provider: Box<dyn LlmProvider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    fn build_request(&self, req: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            system: system_prompt(req.channel, req.display_name.as_deref()),
            messages: vec![Message {
                role: Role::User,
                content: req.prompt.clone(),
                name: req.display_name.as_deref().and_then(participant_name),
            }],
            max_tokens: self.max_tokens,
        }
    }
}

/// Fold a display name into the character set chat APIs accept for
/// `name`. `None` when nothing usable is left.
fn participant_name(display_name: &str) -> Option<String> {
    let name: String = display_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if name.chars().all(|c| c == '_') {
        return None;
    }
    Some(name)
}

#[async_trait]
impl CompletionProvider for LlmCompletionProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<String, CompletionError> {
        let chat = self.build_request(req);
        debug!(
            channel = %req.channel,
            channel_id = %req.channel_id,
            model = %chat.model,
            provider = %self.provider.name(),
            "requesting completion"
        );

        let resp = self
            .provider
            .send(&chat)
            .await
            .map_err(|source| CompletionError::Provider {
                provider: self.provider.name().to_string(),
                source,
            })?;

        info!(
            channel = %req.channel,
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            stop_reason = %resp.stop_reason,
            "completion received"
        );

        if resp.content.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(resp.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ProviderError};
    use std::sync::{Arc, Mutex};

    /// Records the last request and answers with a canned reply.
    struct Recorder {
        seen: Arc<Mutex<Option<ChatRequest>>>,
        reply: Result<String, u16>,
    }

    #[async_trait]
    impl LlmProvider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            *self.seen.lock().unwrap() = Some(req.clone());
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    model: req.model.clone(),
                    tokens_in: 5,
                    tokens_out: 2,
                    stop_reason: "stop".to_string(),
                }),
                Err(status) => Err(ProviderError::Api {
                    status: *status,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    fn completion_request() -> CompletionRequest {
        CompletionRequest {
            channel: Channel::Whatsapp,
            channel_id: "237670000000".to_string(),
            display_name: Some("Alice".to_string()),
            prompt: "What is the capital of Cameroon?".to_string(),
        }
    }

    #[tokio::test]
    async fn frames_prompt_with_channel_and_name() {
        let seen = Arc::new(Mutex::new(None));
        let provider = LlmCompletionProvider::new(
            Box::new(Recorder {
                seen: seen.clone(),
                reply: Ok("Yaoundé\n".to_string()),
            }),
            "gpt-3.5-turbo".to_string(),
            3000,
        );

        let text = provider.complete(&completion_request()).await.unwrap();
        // trailing newline trimming is the relay's job
        assert_eq!(text, "Yaoundé\n");

        let req = seen.lock().unwrap().clone().expect("request recorded");
        assert_eq!(req.model, "gpt-3.5-turbo");
        assert_eq!(req.max_tokens, 3000);
        assert_eq!(
            req.system,
            "As Alice chatting with the AI language model via whatsapp."
        );
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].content, "What is the capital of Cameroon?");
        assert_eq!(req.messages[0].name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn user_turn_omits_missing_name() {
        let seen = Arc::new(Mutex::new(None));
        let provider = LlmCompletionProvider::new(
            Box::new(Recorder {
                seen: seen.clone(),
                reply: Ok("hi".to_string()),
            }),
            "gpt-3.5-turbo".to_string(),
            3000,
        );
        let mut req = completion_request();
        req.display_name = None;

        provider.complete(&req).await.unwrap();
        let sent = seen.lock().unwrap().clone().expect("request recorded");
        assert_eq!(sent.messages[0].name, None);
    }

    #[test]
    fn participant_name_is_api_safe() {
        assert_eq!(participant_name("Alice"), Some("Alice".to_string()));
        assert_eq!(participant_name(" Jean Paul "), Some("Jean_Paul".to_string()));
        assert_eq!(participant_name("Zoë"), Some("Zo_".to_string()));
        assert_eq!(participant_name("😀 "), None);
        assert_eq!(participant_name(&"a".repeat(100)).map(|n| n.len()), Some(64));
    }

    #[tokio::test]
    async fn provider_failure_keeps_source() {
        let provider = LlmCompletionProvider::new(
            Box::new(Recorder {
                seen: Arc::new(Mutex::new(None)),
                reply: Err(503),
            }),
            "gpt-3.5-turbo".to_string(),
            3000,
        );

        let err = provider.complete(&completion_request()).await.unwrap_err();
        match err {
            CompletionError::Provider { provider, source } => {
                assert_eq!(provider, "recorder");
                assert!(matches!(source, ProviderError::Api { status: 503, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn blank_reply_is_empty_error() {
        let provider = LlmCompletionProvider::new(
            Box::new(Recorder {
                seen: Arc::new(Mutex::new(None)),
                reply: Ok("\n\n".to_string()),
            }),
            "gpt-3.5-turbo".to_string(),
            3000,
        );

        let err = provider.complete(&completion_request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Empty));
    }
}
