use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{OutboundMessage, SendReceipt},
};

/// Common interface implemented by every channel transport (SMS, WhatsApp, …).
///
/// Transports are stateless HTTP clients, so `send` takes `&self` and
/// implementations must be `Send + Sync` to be shared behind an `Arc`.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Stable lowercase identifier for this transport (e.g. `"nexmo"`).
    fn name(&self) -> &str;

    /// Deliver a single outbound message and return the provider's message ID.
    ///
    /// Implementations own their timeout budget and must not retry.
    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError>;
}
