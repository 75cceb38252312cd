//! Configuration schema definitions.
//!
//! This module defines the complete construction-time configuration of the
//! observability facade. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the observability facade.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservanceConfig {
    /// Application name, attached to every log record as `name`.
    pub app_name: String,

    /// Minimum log level (trace, debug, info, warn, error, fatal, panic).
    pub log_level: String,

    /// Release/version tag sent with error reports.
    pub version: Option<String>,

    /// Deployment environment sent with error reports.
    pub environment: Option<String>,

    /// Remote error tracking settings.
    pub error_tracking: ErrorTrackingConfig,

    /// Metrics push settings.
    pub metrics: MetricsConfig,

    /// Request enrichment settings.
    pub request: RequestFieldConfig,
}

impl Default for ObservanceConfig {
    fn default() -> Self {
        Self {
            app_name: "service".to_string(),
            log_level: "info".to_string(),
            version: None,
            environment: None,
            error_tracking: ErrorTrackingConfig::default(),
            metrics: MetricsConfig::default(),
            request: RequestFieldConfig::default(),
        }
    }
}

/// Remote error tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorTrackingConfig {
    /// Collector DSN (`scheme://public_key@host/project_id`).
    /// Error tracking is disabled when unset or empty.
    pub dsn: Option<String>,

    /// Levels mirrored to the collector.
    pub levels: Vec<String>,

    /// Capacity of the delivery queue. Events beyond it are dropped.
    pub queue_capacity: usize,

    /// Timeout of a single submission in milliseconds.
    pub send_timeout_ms: u64,

    /// Upper bound for a shutdown flush in milliseconds.
    pub flush_timeout_ms: u64,

    /// Prefix prepended to every reported message.
    pub message_prefix: String,

    /// Static tags attached to every event.
    pub tags: BTreeMap<String, String>,

    /// Path fragments identifying third-party stack frames.
    pub dependency_markers: Vec<String>,
}

impl Default for ErrorTrackingConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            levels: vec!["error".to_string(), "fatal".to_string(), "panic".to_string()],
            queue_capacity: 100,
            // 100ms turned out too short for the first event of a process
            send_timeout_ms: 500,
            flush_timeout_ms: 5_000,
            message_prefix: String::new(),
            tags: BTreeMap::new(),
            dependency_markers: crate::observability::stacktrace::DEFAULT_DEPENDENCY_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

impl ErrorTrackingConfig {
    /// The configured DSN, treating an empty string as unset.
    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref().map(str::trim).filter(|dsn| !dsn.is_empty())
    }
}

/// Metrics push configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Push gateway base URL. Metrics are disabled when unset or empty.
    pub endpoint: Option<String>,

    /// Push interval in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            flush_interval_ms: 10_000,
        }
    }
}

impl MetricsConfig {
    /// The configured endpoint, treating an empty string as unset.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
    }
}

/// Header names consumed when deriving a request-scoped facade.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestFieldConfig {
    /// Header carrying the correlation id, logged as `requestId`.
    pub request_id_header: String,

    /// Header carrying the tenant/account id, logged as `accountId`.
    pub account_id_header: String,

    /// Additional header name to field name mappings.
    pub logged_headers: BTreeMap<String, String>,
}

impl Default for RequestFieldConfig {
    fn default() -> Self {
        Self {
            request_id_header: crate::http::X_REQUEST_ID.to_string(),
            account_id_header: crate::http::X_ACCOUNT_ID.to_string(),
            logged_headers: BTreeMap::new(),
        }
    }
}
