//! Meta WhatsApp webhook: GET (verification handshake) and POST (events)
//! on /v1/whatsapp/events.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use discuss_whatsapp::signature::SIGNATURE_HEADER;
use discuss_whatsapp::{verify_signature, VerifyRequest, WebhookPayload};

use crate::app::AppState;
use crate::http::response::{accepted, error, ApiResponse};

/// GET /v1/whatsapp/events: echo `hub.challenge` as plain text.
///
/// With a verify token configured, `hub.verify_token` must match (403 otherwise).
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Query(req): Query<VerifyRequest>,
) -> Response {
    let expected = state
        .config
        .channels
        .whatsapp
        .as_ref()
        .and_then(|c| c.verify_token.as_deref());

    match req.accept(expected) {
        Some(challenge) => {
            info!(mode = %req.mode, "whatsapp webhook verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            warn!(mode = %req.mode, "whatsapp verify token mismatch");
            error(StatusCode::FORBIDDEN, "invalid verify token").into_response()
        }
    }
}

/// POST /v1/whatsapp/events: relay every user message in the payload.
///
/// Status-only deliveries are acknowledged without relaying.
pub async fn event_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    let app_secret = state
        .config
        .channels
        .whatsapp
        .as_ref()
        .and_then(|c| c.app_secret.as_deref());

    if let Some(secret) = app_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, header) {
            warn!(reason = %e, "whatsapp webhook authentication failed");
            return error(StatusCode::UNAUTHORIZED, "authentication failed");
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "invalid JSON in whatsapp webhook body");
            return error(StatusCode::BAD_REQUEST, "cannot decode whatsapp request body");
        }
    };

    if payload.is_status_only() {
        for status in payload.statuses() {
            debug!(id = %status.id, status = %status.status, "whatsapp delivery status");
        }
        return accepted("status update acknowledged", json!({"outcomes": []}));
    }

    let messages = payload.inbound_messages();
    info!(count = messages.len(), "whatsapp messages received");

    let mut outcomes: Vec<Value> = Vec::with_capacity(messages.len());
    for msg in &messages {
        let report = state.relay_inbound(msg).await;
        outcomes.push(json!({
            "message_id": msg.message_id,
            "outcome": report.outcome.label(),
        }));
    }

    accepted("event received successfully", json!({"outcomes": outcomes}))
}
