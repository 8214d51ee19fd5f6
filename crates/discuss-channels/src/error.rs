use discuss_core::Channel;
use thiserror::Error;

/// Errors that can occur within any channel transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The HTTP request to the provider could not be completed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The provider answered but refused the message.
    #[error("Send rejected by provider ({status}): {reason}")]
    Rejected { status: String, reason: String },

    /// The provider's response could not be decoded.
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    /// No transport is registered for the message's channel.
    #[error("No transport configured for channel {0}")]
    NotConfigured(Channel),

    /// The channel-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
