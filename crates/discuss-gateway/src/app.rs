use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use discuss_channels::InboundMessage;
use discuss_core::{Channel, DiscussConfig};
use discuss_messages::MessageStore;
use discuss_relay::{MessageRelay, RelayReport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: DiscussConfig,
    pub relay: MessageRelay,
    pub messages: MessageStore,
    /// Channels with a registered transport.
    pub channels: Vec<Channel>,
    /// Cancelled on shutdown; every relay invocation runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: DiscussConfig,
        relay: MessageRelay,
        messages: MessageStore,
        channels: Vec<Channel>,
    ) -> Self {
        Self {
            config,
            relay,
            messages,
            channels,
            shutdown: CancellationToken::new(),
        }
    }

    /// Log the prompt, then run it through the relay.
    ///
    /// A failed log write never blocks the reply.
    pub async fn relay_inbound(&self, msg: &InboundMessage) -> RelayReport {
        match self
            .messages
            .record(msg.channel, &msg.from, msg.display_name.as_deref())
        {
            Ok(record) => match self.messages.count_for_sender(msg.channel, &msg.from) {
                Ok(prompts) => {
                    info!(channel = %msg.channel, id = %record.id, prompts, "inbound message recorded")
                }
                Err(e) => warn!(channel = %msg.channel, error = %e, "cannot count sender prompts"),
            },
            Err(e) => warn!(channel = %msg.channel, error = %e, "cannot record inbound message"),
        }
        self.relay.handle(msg, &self.shutdown.child_token()).await
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/v1/nexmo/receive",
            post(crate::http::nexmo::receive_handler),
        )
        .route(
            "/v1/whatsapp/events",
            get(crate::http::whatsapp::verify_handler).post(crate::http::whatsapp::event_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
