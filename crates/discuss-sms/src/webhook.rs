//! Inbound SMS webhook payload as Vonage posts it to `/v1/nexmo/receive`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use discuss_channels::types::CONTENT_TYPE_TEXT;
use discuss_channels::InboundMessage;
use discuss_core::Channel;

/// Longest inbound text we accept, in characters.
pub const MAX_TEXT_CHARS: usize = 1024;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Inbound SMS fields. Vonage sends every value as a string, as JSON or as a
/// form body depending on the account's webhook settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexmoReceiveRequest {
    #[serde(rename = "api-key")]
    pub api_key: String,
    pub msisdn: String,
    pub to: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub keyword: String,
    #[serde(rename = "message-timestamp")]
    pub message_timestamp: String,
    pub timestamp: String,
    pub nonce: String,
    pub concat: String,
    #[serde(rename = "concat-ref")]
    pub concat_ref: String,
    #[serde(rename = "concat-total")]
    pub concat_total: String,
    #[serde(rename = "concat-part")]
    pub concat_part: String,
    pub data: String,
    pub udh: String,
}

/// Field name → human-readable problems, rendered as the 422 body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    fn add(&mut self, field: &str, problem: String) {
        self.0.entry(field.to_string()).or_default().push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl NexmoReceiveRequest {
    /// Normalize phone numbers to `+<digits>` and trim the text.
    pub fn sanitize(mut self) -> Self {
        self.to = sanitize_phone_number(&self.to);
        self.msisdn = sanitize_phone_number(&self.msisdn);
        self.text = self.text.trim().to_string();
        self
    }

    /// Check a sanitized request. Every failing field is reported at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for (field, value) in [("to", &self.to), ("msisdn", &self.msisdn)] {
            if value.is_empty() {
                errors.add(field, format!("The {} field is required", field));
            } else if !is_phone_number(value) {
                errors.add(field, format!("The {} field must be a valid phone number", field));
            }
        }

        let chars = self.text.chars().count();
        if chars == 0 {
            errors.add("text", "The text field is required".to_string());
        } else if chars > MAX_TEXT_CHARS {
            errors.add(
                "text",
                format!("The text field must be maximum {} char", MAX_TEXT_CHARS),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.concat.eq_ignore_ascii_case("true")
    }

    /// Normalized relay input. Call after [`sanitize`](Self::sanitize).
    pub fn into_inbound(self) -> InboundMessage {
        let multipart_reference = self.is_multipart().then(|| self.concat_ref.clone());
        let content_type = content_type(&self.kind);
        InboundMessage {
            channel: Channel::Sms,
            from: self.msisdn,
            to: self.to,
            content_type,
            text: self.text,
            message_id: self.message_id,
            multipart_reference,
            display_name: None,
        }
    }
}

/// Vonage's `text` and `unicode` are both plain text to us; anything else
/// (`binary`, …) passes through and is rejected by channel policy.
fn content_type(kind: &str) -> String {
    let kind = kind.trim().to_ascii_lowercase();
    match kind.as_str() {
        "" | "text" | "unicode" => CONTENT_TYPE_TEXT.to_string(),
        _ => kind,
    }
}

fn sanitize_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    format!("+{}", digits)
}

fn is_phone_number(value: &str) -> bool {
    value.strip_prefix('+').map_or(false, |digits| {
        (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit())
    })
}
