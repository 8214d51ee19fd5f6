use discuss_core::Channel;
use serde::{Deserialize, Serialize};

/// Content type of a plain text message, the only type every channel accepts.
pub const CONTENT_TYPE_TEXT: &str = "text";

/// A message received from a provider webhook, already decoded and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: Channel,

    /// Sender address on the channel (phone number, WhatsApp ID, …).
    pub from: String,

    /// Our address the message was sent to (virtual number, phone number ID, …).
    pub to: String,

    /// Provider content type, e.g. `"text"`, `"image"`, `"audio"`.
    pub content_type: String,

    /// Plain text content. Empty for non-text content types.
    pub text: String,

    /// Provider-assigned message identifier.
    pub message_id: String,

    /// Concatenation reference shared by every segment of a multipart SMS.
    pub multipart_reference: Option<String>,

    /// Human-readable sender name, when the provider supplies one.
    pub display_name: Option<String>,
}

impl InboundMessage {
    /// A single-part text message with no display name.
    pub fn text(
        channel: Channel,
        from: impl Into<String>,
        to: impl Into<String>,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            from: from.into(),
            to: to.into(),
            content_type: CONTENT_TYPE_TEXT.to_string(),
            text: text.into(),
            message_id: message_id.into(),
            multipart_reference: None,
            display_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_multipart_reference(mut self, reference: impl Into<String>) -> Self {
        self.multipart_reference = Some(reference.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A message to be delivered to a channel by its transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: Channel,

    /// Our address the reply is sent from.
    pub from: String,

    /// Recipient address.
    pub to: String,

    /// Provider message ID this reply threads under, on channels that thread.
    pub reply_to_message_id: Option<String>,

    pub body: String,
}

impl OutboundMessage {
    /// Address a reply back to the sender of `inbound`.
    pub fn reply_to(inbound: &InboundMessage, body: impl Into<String>) -> Self {
        Self {
            channel: inbound.channel,
            from: inbound.to.clone(),
            to: inbound.from.clone(),
            reply_to_message_id: None,
            body: body.into(),
        }
    }

    pub fn threaded(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to_message_id = Some(message_id.into());
        self
    }
}

/// What a transport reports back after the provider accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub provider_message_id: String,
}
