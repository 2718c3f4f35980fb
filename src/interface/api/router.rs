//! API Router configuration

use super::callbacks::lifecycle_callback_handler;
use super::event_grid::incoming_call_handler;
use super::health::health_check;
use super::media_ws::media_ws_handler;
use super::metrics_handler::{metrics_handler, track_http_metrics};
use super::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    // Platform webhooks
    let webhook_routes = Router::new()
        .route("/api/incomingCall", post(incoming_call_handler))
        .route("/api/callbacks/:context_id", post(lifecycle_callback_handler));

    // Media connection opened by the platform
    let media_routes = Router::new().route("/ws", get(media_ws_handler));

    let health_routes = Router::new().route("/health", get(health_check));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    Router::new()
        .merge(webhook_routes)
        .merge(media_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
