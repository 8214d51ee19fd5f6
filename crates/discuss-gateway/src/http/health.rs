use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

/// GET /health: liveness check with the channels this instance can answer on
/// and when the last prompt arrived.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let last_message_at = match state.messages.recent(1) {
        Ok(records) => records.first().map(|r| r.created_at.to_rfc3339()),
        Err(e) => {
            warn!(error = %e, "cannot read message log");
            None
        }
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "channels": state.channels,
        "last_message_at": last_message_at,
    }))
}
