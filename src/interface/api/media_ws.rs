//! Media WebSocket endpoint
//!
//! The platform opens one connection per answered call at the transport URL
//! handed over in the answer command.

use super::state::AppState;
use crate::domain::correlation::CallRecord;
use crate::domain::pipeline::{CancelToken, SessionBinding};
use crate::domain::shared::{CorrelationId, DomainError};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::StreamExt;
use metrics::counter;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct MediaQuery {
    pub uuid: Option<String>,
    #[serde(rename = "acsPhoneNumber")]
    pub acs_phone_number: Option<String>,
}

/// GET /ws?uuid=<correlationId>&acsPhoneNumber=<destination>
pub async fn media_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_socket(socket, state, query))
}

async fn handle_media_socket(socket: WebSocket, state: AppState, query: MediaQuery) {
    let Some(correlation_id) = query.uuid.as_deref().and_then(CorrelationId::parse) else {
        warn!("Media connection without uuid; closing");
        close(socket).await;
        return;
    };

    let record = match state.store.get(&correlation_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            counter!("correlation_misses_total").increment(1);
            warn!(
                "Media connection rejected: {}",
                DomainError::CorrelationMiss(correlation_id.to_string())
            );
            close(socket).await;
            return;
        }
        Err(e) => {
            error!("Media connection for {}: store lookup failed: {}", correlation_id, e);
            close(socket).await;
            return;
        }
    };

    info!(
        "Media connection accepted: correlation_id={}, acs_phone_number={}",
        correlation_id,
        query.acs_phone_number.as_deref().unwrap_or("-")
    );

    let binding = binding_for(correlation_id.clone(), &record, query.acs_phone_number);
    let (sink, stream) = socket.split();

    if let Err(e) = state.bridge.run(binding, stream, sink).await {
        error!("Media session for {} failed: {}", correlation_id, e);
    }
}

fn binding_for(
    correlation_id: CorrelationId,
    record: &CallRecord,
    acs_phone_number: Option<String>,
) -> SessionBinding {
    SessionBinding {
        correlation_id,
        destination_number: acs_phone_number
            .filter(|n| !n.trim().is_empty())
            .or_else(|| record.acs_mobile_number.get().cloned()),
        caller_id: record.caller_id.get().cloned(),
        cancel: CancelToken::new(),
    }
}

async fn close(mut socket: WebSocket) {
    let _ = socket.send(Message::Close(None)).await;
}
