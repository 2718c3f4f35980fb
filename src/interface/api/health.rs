//! Health check

use super::dto::{ApiResponse, HealthStatus};
use super::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use tracing::error;

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthStatus>>) {
    let media_sessions = state.sessions.active_count().await;

    match state.store.size().await {
        Ok(count) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthStatus {
                status: "ok".to_string(),
                store_reachable: true,
                correlation_records: Some(count),
                media_sessions,
            })),
        ),
        Err(e) => {
            error!("Health check: correlation store unreachable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::success(HealthStatus {
                    status: "degraded".to_string(),
                    store_reachable: false,
                    correlation_records: None,
                    media_sessions,
                })),
            )
        }
    }
}
