//! Vonage inbound SMS webhook: POST /v1/nexmo/receive.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};
use serde_json::json;
use tracing::{info, warn};

use discuss_sms::NexmoReceiveRequest;

use crate::app::AppState;
use crate::http::response::{accepted, error, unprocessable, ApiResponse};

/// Decode, sanitize and validate the SMS, then relay it.
///
/// 400 on an undecodable body, 422 on validation errors, otherwise 202 once
/// the relay has finished with the message.
pub async fn receive_handler(State(state): State<Arc<AppState>>, req: Request) -> ApiResponse {
    let payload = match decode(req).await {
        Ok(payload) => payload.sanitize(),
        Err(reason) => {
            warn!(reason = %reason, "cannot decode nexmo webhook");
            return error(StatusCode::BAD_REQUEST, "cannot decode nexmo request body");
        }
    };

    if let Err(errors) = payload.validate() {
        warn!(errors = ?errors, "invalid nexmo webhook");
        return unprocessable("validation errors while receiving message", errors);
    }

    let msg = payload.into_inbound();
    info!(from = %msg.from, multipart = msg.multipart_reference.is_some(), "sms received");

    let report = state.relay_inbound(&msg).await;
    accepted(
        "message received successfully",
        json!({"outcome": report.outcome.label()}),
    )
}

/// Vonage posts either JSON or a urlencoded form, depending on account settings.
async fn decode(req: Request) -> Result<NexmoReceiveRequest, String> {
    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        Form::<NexmoReceiveRequest>::from_request(req, &())
            .await
            .map(|Form(payload)| payload)
            .map_err(|e| e.body_text())
    } else {
        Json::<NexmoReceiveRequest>::from_request(req, &())
            .await
            .map(|Json(payload)| payload)
            .map_err(|e| e.body_text())
    }
}
