//! Meta webhook payloads for the WhatsApp Business `messages` field.

use serde::{Deserialize, Serialize};

use discuss_channels::InboundMessage;
use discuss_core::Channel;

/// Top-level webhook body: `{object, entry: [{id, changes: [{field, value}]}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<MessageStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,
    /// Business phone number the message was sent to; replies go out on it.
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub wa_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

/// Delivery receipt for a message we sent (`sent`, `delivered`, `read`, …).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub recipient_id: String,
}

impl WebhookPayload {
    fn values(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .map(|c| &c.value)
    }

    /// The payload carries delivery receipts but no user messages.
    pub fn is_status_only(&self) -> bool {
        let mut has_status = false;
        for value in self.values() {
            if !value.messages.is_empty() {
                return false;
            }
            has_status |= !value.statuses.is_empty();
        }
        has_status
    }

    pub fn statuses(&self) -> impl Iterator<Item = &MessageStatus> {
        self.values().flat_map(|v| v.statuses.iter())
    }

    /// Every user message in the payload, normalized for the relay.
    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        self.values()
            .flat_map(|value| {
                value
                    .messages
                    .iter()
                    .map(move |m| to_inbound(m, value))
            })
            .collect()
    }
}

fn to_inbound(msg: &WebhookMessage, value: &ChangeValue) -> InboundMessage {
    let display_name = value
        .contacts
        .iter()
        .find(|c| c.wa_id == msg.from)
        .or_else(|| value.contacts.first())
        .map(|c| c.profile.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    InboundMessage {
        channel: Channel::Whatsapp,
        from: msg.from.clone(),
        to: value.metadata.phone_number_id.clone(),
        content_type: msg.kind.to_ascii_lowercase(),
        text: msg
            .text
            .as_ref()
            .map(|t| t.body.clone())
            .unwrap_or_default(),
        message_id: msg.id.clone(),
        multipart_reference: None,
        display_name,
    }
}

/// The only `hub.mode` Meta sends when registering a webhook.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Query of the `GET` verification handshake Meta performs when the webhook
/// URL is registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "hub.mode", default)]
    pub mode: String,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: String,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: String,
}

impl VerifyRequest {
    /// The challenge to echo back, or `None` when a verify token is
    /// configured and the request is not a `subscribe` presenting it.
    pub fn accept(&self, expected_token: Option<&str>) -> Option<&str> {
        match expected_token {
            Some(expected) if self.mode != SUBSCRIBE_MODE || self.verify_token != expected => None,
            _ => Some(&self.challenge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT_PAYLOAD: &str = r#"{
      "object": "whatsapp_business_account",
      "entry": [{
        "id": "102290129340398",
        "changes": [{
          "field": "messages",
          "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550783881", "phone_number_id": "106540352242922"},
            "contacts": [{"profile": {"name": "Alice"}, "wa_id": "237670000000"}],
            "messages": [{
              "from": "237670000000",
              "id": "wamid.HBgLMTY1MDM4Nzk0MzkVAgASGBQzQTRBNjU5OUFFRTAzODEwMTQ0RgA=",
              "timestamp": "1669233778",
              "text": {"body": "What is the capital of Cameroon?"},
              "type": "text"
            }]
          }
        }]
      }]
    }"#;

    const STATUS_PAYLOAD: &str = r#"{
      "object": "whatsapp_business_account",
      "entry": [{
        "id": "102290129340398",
        "changes": [{
          "field": "messages",
          "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550783881", "phone_number_id": "106540352242922"},
            "statuses": [{"id": "wamid.out", "status": "delivered", "timestamp": "1669233779", "recipient_id": "237670000000"}]
          }
        }]
      }]
    }"#;

    #[test]
    fn text_message_becomes_inbound() {
        let payload: WebhookPayload = serde_json::from_str(TEXT_PAYLOAD).unwrap();
        assert!(!payload.is_status_only());

        let messages = payload.inbound_messages();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.channel, Channel::Whatsapp);
        assert_eq!(msg.from, "237670000000");
        assert_eq!(msg.to, "106540352242922");
        assert_eq!(msg.content_type, "text");
        assert_eq!(msg.text, "What is the capital of Cameroon?");
        assert!(msg.message_id.starts_with("wamid."));
        assert_eq!(msg.display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn image_message_has_type_and_no_text() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "metadata": {"phone_number_id": "106540352242922"},
                "messages": [{"from": "2376", "id": "wamid.img", "type": "image",
                              "image": {"id": "media-1", "mime_type": "image/jpeg"}}]
            }}]}]
        }))
        .unwrap();

        let messages = payload.inbound_messages();
        assert_eq!(messages[0].content_type, "image");
        assert_eq!(messages[0].text, "");
        assert_eq!(messages[0].display_name, None);
    }

    #[test]
    fn status_update_is_status_only() {
        let payload: WebhookPayload = serde_json::from_str(STATUS_PAYLOAD).unwrap();
        assert!(payload.is_status_only());
        assert!(payload.inbound_messages().is_empty());
        assert_eq!(payload.statuses().next().unwrap().status, "delivered");
    }

    #[test]
    fn empty_payload_is_not_status_only() {
        let payload = WebhookPayload::default();
        assert!(!payload.is_status_only());
        assert!(payload.inbound_messages().is_empty());
    }

    #[test]
    fn verify_checks_token_when_configured() {
        let req = VerifyRequest {
            mode: "subscribe".to_string(),
            challenge: "1158201444".to_string(),
            verify_token: "secret".to_string(),
        };
        assert_eq!(req.accept(Some("secret")), Some("1158201444"));
        assert_eq!(req.accept(Some("other")), None);
        assert_eq!(req.accept(None), Some("1158201444"));
    }

    #[test]
    fn verify_requires_subscribe_mode_when_configured() {
        let req = VerifyRequest {
            mode: "unsubscribe".to_string(),
            challenge: "1158201444".to_string(),
            verify_token: "secret".to_string(),
        };
        assert_eq!(req.accept(Some("secret")), None);
        assert_eq!(req.accept(None), Some("1158201444"));
    }

    #[test]
    fn missing_type_is_passed_through_empty() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "metadata": {"phone_number_id": "106540352242922"},
                "messages": [{"from": "2376", "id": "wamid.untyped", "text": {"body": "hi"}}]
            }}]}]
        }))
        .unwrap();

        let messages = payload.inbound_messages();
        assert_eq!(messages[0].content_type, "");
        assert_eq!(messages[0].text, "hi");
    }
}
