use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use discuss_channels::{ChannelError, ChannelTransport, OutboundMessage, SendReceipt};
use discuss_core::config::NexmoConfig;

/// Per-message status Vonage reports for an accepted SMS.
const STATUS_OK: &str = "0";

/// Sends SMS through the Vonage SMS API (`POST /sms/json`).
pub struct NexmoTransport {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl NexmoTransport {
    pub fn new(config: &NexmoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChannelTransport for NexmoTransport {
    fn name(&self) -> &str {
        "nexmo"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        let url = format!("{}/sms/json", self.base_url);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "api_secret": self.api_secret,
            "from": msg.from,
            "to": msg.to,
            "text": msg.body,
        });

        debug!(to = %msg.to, chars = msg.body.chars().count(), "sending sms");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "nexmo API error");
            return Err(ChannelError::Rejected {
                status: status.as_u16().to_string(),
                reason: text,
            });
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

        parse_send_response(parsed)
    }
}

/// The first message entry decides: a long text is split into several
/// entries, all sharing the same fate.
fn parse_send_response(resp: SendResponse) -> Result<SendReceipt, ChannelError> {
    let first = resp
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| ChannelError::InvalidResponse("no messages in response".to_string()))?;

    if first.status != STATUS_OK {
        return Err(ChannelError::Rejected {
            status: first.status,
            reason: first.error_text.unwrap_or_default(),
        });
    }

    first
        .message_id
        .map(|provider_message_id| SendReceipt {
            provider_message_id,
        })
        .ok_or_else(|| ChannelError::InvalidResponse("accepted message has no id".to_string()))
}

// Vonage SMS API response types (private, deserialization only)

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SendStatus>,
}

#[derive(Deserialize)]
struct SendStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use discuss_core::Channel;
    use mockito::Matcher;

    fn transport(base_url: String) -> NexmoTransport {
        NexmoTransport::new(&NexmoConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            base_url,
        })
    }

    fn outbound() -> OutboundMessage {
        OutboundMessage {
            channel: Channel::Sms,
            from: "+1777".to_string(),
            to: "+1555".to_string(),
            reply_to_message_id: None,
            body: "hi there".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_credentials_and_addresses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sms/json")
            .match_body(Matcher::Json(serde_json::json!({
                "api_key": "key",
                "api_secret": "secret",
                "from": "+1777",
                "to": "+1555",
                "text": "hi there",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"message-count":"1","messages":[{"to":"1555","message-id":"0A0000001234","status":"0"}]}"#,
            )
            .create_async()
            .await;

        let receipt = transport(server.url()).send(&outbound()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.provider_message_id, "0A0000001234");
    }

    #[tokio::test]
    async fn non_zero_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sms/json")
            .with_status(200)
            .with_body(
                r#"{"message-count":"1","messages":[{"status":"4","error-text":"Bad Credentials"}]}"#,
            )
            .create_async()
            .await;

        let err = transport(server.url()).send(&outbound()).await.unwrap_err();
        match err {
            ChannelError::Rejected { status, reason } => {
                assert_eq!(status, "4");
                assert_eq!(reason, "Bad Credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn http_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sms/json")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let err = transport(server.url()).send(&outbound()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected { ref status, .. } if status == "500"));
    }

    #[tokio::test]
    async fn empty_messages_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sms/json")
            .with_status(200)
            .with_body(r#"{"message-count":"0","messages":[]}"#)
            .create_async()
            .await;

        let err = transport(server.url()).send(&outbound()).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidResponse(_)));
    }
}
