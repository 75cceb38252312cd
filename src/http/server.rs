//! HTTP server for the observed demo service.
//!
//! # Responsibilities
//! - Create the Axum router with demo handlers
//! - Wire up middleware (request ID, tracing, request observation)
//! - Serve until the shutdown coordinator fires

use axum::{
    http::{HeaderName, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ObservanceConfig, ValidationError};
use crate::error::{ObservanceError, ObservanceResult};
use crate::http::middleware::observe_request;
use crate::lifecycle::Shutdown;
use crate::observability::Observance;

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(observance: Observance, config: &ObservanceConfig) -> ObservanceResult<Self> {
        let header = &config.request.request_id_header;
        let request_id = HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
            ObservanceError::invalid_config(ValidationError::InvalidHeaderName(header.clone()))
        })?;

        Ok(Self {
            router: Self::build_router(observance, request_id),
        })
    }

    /// Outermost first: the request id must exist before the request is
    /// observed.
    fn build_router(observance: Observance, request_id: HeaderName) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/fail", get(fail_handler))
            .route("/panic", get(panic_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn_with_state(observance, observe_request)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index_handler(Extension(observance): Extension<Observance>) -> impl IntoResponse {
    observance.logger().info("Serving index");
    "ok"
}

async fn fail_handler(Extension(observance): Extension<Observance>) -> impl IntoResponse {
    let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream reset the connection");
    observance
        .logger()
        .with_field("upstream", Value::String("inventory".to_string()))
        .with_error(&err)
        .error("Inventory lookup failed");
    (StatusCode::BAD_GATEWAY, "upstream failure")
}

async fn panic_handler() -> &'static str {
    let orders: Vec<u32> = Vec::new();
    if orders.is_empty() {
        panic!("no orders to settle");
    }
    "settled"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::TestLogger;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn server() -> (HttpServer, TestLogger) {
        let logger = TestLogger::new();
        let observance = Observance::from_parts(Arc::new(logger.clone()), None);
        let server = HttpServer::new(observance, &ObservanceConfig::default()).unwrap();
        (server, logger)
    }

    #[tokio::test]
    async fn test_request_id_is_generated_and_logged() {
        let (server, logger) = server();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        let entry = &logger.entries()[0];
        assert_eq!(entry.message, "Serving index");
        assert_eq!(entry.fields.get("requestId"), Some(&Value::String(echoed)));
    }

    #[tokio::test]
    async fn test_fail_handler_logs_attached_error() {
        let (server, logger) = server();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let entry = &logger.entries()[0];
        assert_eq!(
            entry.fields.get("error").and_then(Value::as_str),
            Some("upstream reset the connection")
        );
    }

    #[tokio::test]
    async fn test_panic_route_answers_500() {
        let (server, _) = server();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
