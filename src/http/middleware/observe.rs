//! Request observation middleware.
//! Scopes an [`Observance`] to each request and bounds handler panics.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::http::RequestMetadata;
use crate::observability::Observance;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Derives the request-scoped facade, makes it available to handlers via
/// `Extension<Observance>`, and records request metrics. A panicking
/// handler is logged and answered with a 500.
pub async fn observe_request(
    State(observance): State<Observance>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let metadata = RequestMetadata::from_request(&request);
    let scoped = observance.derive_for_request(&metadata);
    request.extensions_mut().insert(scoped.clone());

    let response = match scoped.recover_and_log_async(next.run(request)).await {
        Some(response) => response,
        None => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
    };

    let status = response.status();
    let elapsed = start.elapsed().as_secs_f64();
    if let Some(metrics) = scoped.metrics() {
        let labels = [("method", metadata.method.as_str()), ("status", status.as_str())];
        metrics.increment_counter(REQUESTS_TOTAL, 1, &labels);
        metrics.record_histogram(REQUEST_DURATION_SECONDS, elapsed, &labels[..1]);
    }

    scoped
        .logger()
        .with_field("status", Value::from(status.as_u16()))
        .with_field("durationMs", Value::from((elapsed * 1000.0).round() as u64))
        .debug("Request completed");

    response
}
