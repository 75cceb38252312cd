//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that level names, DSN and endpoints parse
//! - Validate value ranges (capacities and intervals > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ObservanceConfig → Result<(), Vec<ValidationError>>
//! - Runs before any resource (transport, push task) is created

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ObservanceConfig;
use crate::observability::dsn::Dsn;
use crate::observability::severity::Severity;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("app_name must not be empty")]
    EmptyAppName,

    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("unknown error tracking level '{0}'")]
    UnknownReportLevel(String),

    #[error("invalid error tracking DSN: {0}")]
    InvalidDsn(String),

    #[error("error tracking queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("invalid metrics endpoint '{0}'")]
    InvalidMetricsEndpoint(String),

    #[error("metrics flush interval must be greater than zero")]
    ZeroFlushInterval,

    #[error("'{0}' is not a valid HTTP header name")]
    InvalidHeaderName(String),

    #[error("header '{0}' maps to an empty field name")]
    EmptyFieldName(String),

    #[error("error tracking and metrics push require a running tokio runtime")]
    RuntimeUnavailable,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ObservanceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app_name.trim().is_empty() {
        errors.push(ValidationError::EmptyAppName);
    }

    if config.log_level.parse::<Severity>().is_err() {
        errors.push(ValidationError::UnknownLevel(config.log_level.clone()));
    }

    let tracking = &config.error_tracking;
    if let Some(dsn) = tracking.dsn() {
        if let Err(e) = dsn.parse::<Dsn>() {
            errors.push(ValidationError::InvalidDsn(e));
        }
        for level in &tracking.levels {
            if level.parse::<Severity>().is_err() {
                errors.push(ValidationError::UnknownReportLevel(level.clone()));
            }
        }
        if tracking.queue_capacity == 0 {
            errors.push(ValidationError::ZeroQueueCapacity);
        }
    }

    if let Some(endpoint) = config.metrics.endpoint() {
        match url::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidMetricsEndpoint(endpoint.to_string())),
        }
        if config.metrics.flush_interval_ms == 0 {
            errors.push(ValidationError::ZeroFlushInterval);
        }
    }

    let request = &config.request;
    let named = [&request.request_id_header, &request.account_id_header];
    for header in named.into_iter().chain(request.logged_headers.keys()) {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(header.clone()));
        }
    }
    for (header, field) in &request.logged_headers {
        if field.trim().is_empty() {
            errors.push(ValidationError::EmptyFieldName(header.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
