//! Lifecycle callback webhook

use super::state::AppState;
use crate::domain::call::{CallbackEnvelope, WebhookEvent};
use crate::domain::shared::CorrelationId;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "callerId")]
    pub caller_id: Option<String>,
}

/// POST /api/callbacks/:context_id
///
/// Every envelope is decoded and dispatched on its own; a malformed or failing
/// one is logged and the rest of the batch still runs. Always acknowledged
/// with 200.
pub async fn lifecycle_callback_handler(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    Json(envelopes): Json<Vec<Value>>,
) -> StatusCode {
    let Some(correlation_id) = CorrelationId::parse(&context_id) else {
        warn!("Callback with empty correlation id; {} event(s) dropped", envelopes.len());
        return StatusCode::OK;
    };

    info!(
        "Callback batch: correlation_id={}, caller={}, events={}",
        correlation_id,
        query.caller_id.as_deref().unwrap_or("-"),
        envelopes.len()
    );

    for (index, raw) in envelopes.into_iter().enumerate() {
        let envelope: CallbackEnvelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    "Skipping malformed callback envelope #{} for {}: {}",
                    index, correlation_id, e
                );
                continue;
            }
        };
        let event = WebhookEvent::from_envelope(correlation_id.clone(), envelope);
        let kind = event.kind.clone();
        match state.dispatcher.dispatch(event).await {
            Ok(outcome) => debug!("{} for {}: {:?}", kind, correlation_id, outcome),
            Err(e) => error!("Failed to handle {} for {}: {}", kind, correlation_id, e),
        }
    }

    StatusCode::OK
}
