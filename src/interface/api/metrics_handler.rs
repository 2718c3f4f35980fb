//! Prometheus metrics handler

use crate::domain::shared::{DomainError, Result};
use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics exporter
///
/// Installs the global recorder, so it can only succeed once per process.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| DomainError::Configuration(format!("invalid metric buckets: {}", e)))?
        .install_recorder()
        .map_err(|e| DomainError::Configuration(format!("failed to install metrics recorder: {}", e)))?;

    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "webhook_events_total",
        "Lifecycle webhook events received, by kind"
    );
    describe_counter!("calls_answered_total", "Inbound calls answered");
    describe_counter!(
        "incoming_call_redeliveries_total",
        "Redelivered IncomingCall events acknowledged without a second answer"
    );
    describe_counter!(
        "platform_command_failures_total",
        "Call automation commands that failed, by command"
    );
    describe_counter!(
        "correlation_misses_total",
        "Events referencing an unknown correlation identifier"
    );
    describe_counter!("media_frames_in_total", "Caller audio frames forwarded to the pipeline");
    describe_counter!("media_frames_out_total", "Synthesized audio frames written to calls");
    describe_counter!(
        "media_frames_dropped_total",
        "Outbound audio frames dropped, by reason"
    );
    describe_counter!(
        "media_decode_failures_total",
        "Media envelopes that could not be decoded"
    );
    describe_gauge!("media_sessions_active", "Media sessions running on this instance");
    describe_gauge!("correlation_records", "Live records in the correlation store");
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}

/// Middleware recording request count and latency per matched route
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let timer = Timer::new();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    record_http_request(&method, &path, response.status().as_u16(), timer.elapsed());
    response
}

/// Record HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: std::time::Duration) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Update correlation record gauge
pub fn update_correlation_records(count: usize) {
    gauge!("correlation_records").set(count as f64);
}

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
