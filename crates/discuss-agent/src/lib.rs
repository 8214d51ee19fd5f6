pub mod completion;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod router;

pub use completion::{CompletionError, CompletionProvider, CompletionRequest, LlmCompletionProvider};
pub use provider::{LlmProvider, ProviderError};
