use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use discuss_channels::{ChannelError, ChannelTransport, OutboundMessage, SendReceipt};
use discuss_core::config::WhatsAppConfig;

const GRAPH_API_VERSION: &str = "v16.0";

/// Sends text messages through the WhatsApp Cloud API.
///
/// `OutboundMessage::from` is the business phone number ID the reply goes out
/// on; it is part of the request path.
pub struct CloudApiTransport {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl CloudApiTransport {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: config.access_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChannelTransport for CloudApiTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        if msg.from.is_empty() {
            return Err(ChannelError::ConfigError(
                "reply has no sending phone number id".to_string(),
            ));
        }

        let url = format!("{}/{}/{}/messages", self.base_url, GRAPH_API_VERSION, msg.from);
        let body = build_request_body(msg);

        debug!(
            to = %msg.to,
            threaded = msg.reply_to_message_id.is_some(),
            "sending whatsapp message"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "whatsapp API error");
            return Err(ChannelError::Rejected {
                status: status.as_u16().to_string(),
                reason: text,
            });
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| SendReceipt {
                provider_message_id: m.id,
            })
            .ok_or_else(|| ChannelError::InvalidResponse("no messages in response".to_string()))
    }
}

fn build_request_body(msg: &OutboundMessage) -> serde_json::Value {
    let mut body = serde_json::json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": msg.to,
        "type": "text",
        "text": { "body": msg.body },
    });
    if let Some(id) = &msg.reply_to_message_id {
        body["context"] = serde_json::json!({ "message_id": id });
    }
    body
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use discuss_core::Channel;
    use mockito::Matcher;

    fn transport(base_url: String) -> CloudApiTransport {
        CloudApiTransport::new(&WhatsAppConfig {
            access_token: "token".to_string(),
            base_url,
            verify_token: None,
            app_secret: None,
        })
    }

    fn outbound(reply_to: Option<&str>) -> OutboundMessage {
        OutboundMessage {
            channel: Channel::Whatsapp,
            from: "1098765".to_string(),
            to: "237670000000".to_string(),
            reply_to_message_id: reply_to.map(str::to_string),
            body: "Yaoundé".to_string(),
        }
    }

    #[test]
    fn body_without_context_when_not_threaded() {
        let body = build_request_body(&outbound(None));
        assert_eq!(body["messaging_product"], "whatsapp");
        assert_eq!(body["text"]["body"], "Yaoundé");
        assert!(body.get("context").is_none());
    }

    #[tokio::test]
    async fn threaded_reply_posts_context() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v16.0/1098765/messages")
            .match_header("authorization", "Bearer token")
            .match_body(Matcher::Json(serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "237670000000",
                "type": "text",
                "text": { "body": "Yaoundé" },
                "context": { "message_id": "wamid.abc" },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"messaging_product":"whatsapp","contacts":[{"input":"237670000000","wa_id":"237670000000"}],"messages":[{"id":"wamid.out"}]}"#,
            )
            .create_async()
            .await;

        let receipt = transport(server.url())
            .send(&outbound(Some("wamid.abc")))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.provider_message_id, "wamid.out");
    }

    #[tokio::test]
    async fn api_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v16.0/1098765/messages")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token."}}"#)
            .create_async()
            .await;

        let err = transport(server.url())
            .send(&outbound(None))
            .await
            .unwrap_err();
        match err {
            ChannelError::Rejected { status, reason } => {
                assert_eq!(status, "401");
                assert!(reason.contains("Invalid OAuth"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_sender_id_is_config_error() {
        let mut msg = outbound(None);
        msg.from.clear();
        let err = transport("http://127.0.0.1:9".to_string())
            .send(&msg)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::ConfigError(_)));
    }
}
