//! Inbound-call webhook (Event Grid)

use super::dto::{
    ApiResponse, EventGridEvent, ValidationResponse, INCOMING_CALL_EVENT,
    SUBSCRIPTION_VALIDATION_EVENT,
};
use super::state::AppState;
use crate::domain::call::IncomingCallData;
use crate::domain::shared::DomainError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// POST /api/incomingCall
///
/// Answers the subscription handshake, otherwise answers every offered call in
/// the batch. Responds 502 when any answer failed so Event Grid redelivers.
/// Elements that do not decode as Event Grid events are logged and skipped.
pub async fn incoming_call_handler(
    State(state): State<AppState>,
    Json(events): Json<Vec<Value>>,
) -> Response {
    info!("Incoming event batch: {} event(s)", events.len());

    let mut failed = 0usize;
    for (index, raw) in events.into_iter().enumerate() {
        let event: EventGridEvent = match serde_json::from_value(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed Event Grid event #{}: {}", index, e);
                continue;
            }
        };
        match event.event_type.as_str() {
            SUBSCRIPTION_VALIDATION_EVENT => {
                let Some(code) = event.validation_code() else {
                    warn!("Subscription validation event without validationCode");
                    continue;
                };
                info!("Validating Event Grid subscription");
                return (
                    StatusCode::OK,
                    Json(ValidationResponse {
                        validation_response: code.to_string(),
                    }),
                )
                    .into_response();
            }
            INCOMING_CALL_EVENT => {
                let data: IncomingCallData = match serde_json::from_value(event.data) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Malformed IncomingCall event {:?}: {}", event.id, e);
                        continue;
                    }
                };

                match state
                    .dispatcher
                    .handle_incoming_call(data, event.id.as_deref())
                    .await
                {
                    Ok(correlation_id) => debug!("Call offered as {}", correlation_id),
                    Err(DomainError::ValidationError(e)) => {
                        warn!("Rejected IncomingCall event {:?}: {}", event.id, e)
                    }
                    Err(e) => {
                        error!("Failed to take incoming call: {}", e);
                        failed += 1;
                    }
                }
            }
            other => debug!("Ignoring Event Grid event type: {}", other),
        }
    }

    if failed > 0 {
        return (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::error(format!(
                "{} incoming call(s) could not be answered",
                failed
            ))),
        )
            .into_response();
    }

    StatusCode::OK.into_response()
}
