//! Observability facade.
//!
//! # Responsibilities
//! - Build the root logger, error-report dispatcher and metrics reporter
//!   from configuration
//! - Derive request-scoped handles enriched with correlation fields
//! - Bound panics to the handle's logger
//! - Flush remote reporters at shutdown
//!
//! # Data Flow
//! ```text
//! ObservanceConfig
//!     → validate → JsonLogger (+ ErrorReportHook iff DSN)
//!                → PushGatewayReporter (iff metrics endpoint)
//! Per request:
//!     Observance::derive_for_request(meta) → request-scoped Observance
//! Shutdown:
//!     Observance::flush(timeout) → dispatcher drained, metrics pushed
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::config::{validate_config, ObservanceConfig, RequestFieldConfig};
use crate::error::{ObservanceError, ObservanceResult};
use crate::http::RequestMetadata;
use crate::observability::dsn::Dsn;
use crate::observability::hook::{ErrorReportHook, DEFAULT_FLUSH_TIMEOUT};
use crate::observability::logger::{Fields, JsonLogger, Logger};
use crate::observability::metrics::{MetricsReporter, PushGatewayReporter};
use crate::observability::panic_guard;
use crate::observability::severity::Severity;

/// Field names attached by [`Observance::derive_for_request`].
pub const URL_FIELD: &str = "url";
pub const METHOD_FIELD: &str = "method";
pub const REQUEST_ID_FIELD: &str = "requestId";
pub const ACCOUNT_ID_FIELD: &str = "accountId";

/// Header to field mapping applied to inbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestFieldMapping {
    fields: Vec<(String, String)>,
}

impl From<&RequestFieldConfig> for RequestFieldMapping {
    fn from(config: &RequestFieldConfig) -> Self {
        let mut fields = vec![
            (config.request_id_header.clone(), REQUEST_ID_FIELD.to_string()),
            (config.account_id_header.clone(), ACCOUNT_ID_FIELD.to_string()),
        ];
        fields.extend(
            config
                .logged_headers
                .iter()
                .map(|(header, field)| (header.clone(), field.clone())),
        );
        Self { fields }
    }
}

/// Logger plus optional metrics reporter.
///
/// Cloning is cheap. Request-scoped copies share the metrics reporter and
/// the dispatcher with the root; only the logger context differs.
#[derive(Clone)]
pub struct Observance {
    logger: Arc<dyn Logger>,
    metrics: Option<Arc<dyn MetricsReporter>>,
    error_reports: Option<Arc<ErrorReportHook>>,
    request_fields: Arc<RequestFieldMapping>,
}

impl Observance {
    /// Build from configuration. Must be called within a tokio runtime when
    /// a DSN or a metrics endpoint is configured.
    pub fn new(config: &ObservanceConfig) -> ObservanceResult<Self> {
        let level: Severity = config.log_level.parse()?;
        validate_config(config).map_err(ObservanceError::InvalidConfig)?;

        let mut builder = JsonLogger::builder(level, &config.app_name);
        let error_reports = match config.error_tracking.dsn() {
            Some(raw) => {
                let dsn: Dsn = raw.parse().map_err(|e| {
                    ObservanceError::invalid_config(crate::config::ValidationError::InvalidDsn(e))
                })?;
                let hook = Arc::new(ErrorReportHook::from_config(&dsn, config)?);
                builder = builder.hook(hook.clone());
                Some(hook)
            }
            None => None,
        };
        let logger: Arc<dyn Logger> = Arc::new(builder.build());

        let metrics = match config.metrics.endpoint() {
            Some(endpoint) => {
                let reporter = PushGatewayReporter::spawn(
                    endpoint,
                    &config.app_name,
                    Duration::from_millis(config.metrics.flush_interval_ms),
                )?;
                Some(Arc::new(reporter) as Arc<dyn MetricsReporter>)
            }
            None => None,
        };

        tracing::debug!(
            app = %config.app_name,
            log_level = %level,
            error_tracking = error_reports.is_some(),
            metrics = metrics.is_some(),
            "Observance initialized"
        );

        Ok(Self {
            logger,
            metrics,
            error_reports,
            request_fields: Arc::new(RequestFieldMapping::from(&config.request)),
        })
    }

    /// Assemble from existing parts, with the default request mapping.
    pub fn from_parts(logger: Arc<dyn Logger>, metrics: Option<Arc<dyn MetricsReporter>>) -> Self {
        Self {
            logger,
            metrics,
            error_reports: None,
            request_fields: Arc::new(RequestFieldMapping::from(&RequestFieldConfig::default())),
        }
    }

    pub fn with_request_fields(mut self, config: &RequestFieldConfig) -> Self {
        self.request_fields = Arc::new(RequestFieldMapping::from(config));
        self
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn metrics(&self) -> Option<&Arc<dyn MetricsReporter>> {
        self.metrics.as_ref()
    }

    /// Request-scoped copy whose logger carries `url`, `method` and every
    /// mapped header that is present and non-empty.
    pub fn derive_for_request(&self, request: &RequestMetadata) -> Self {
        let mut fields = Fields::new();
        fields.insert(URL_FIELD.to_string(), Value::String(request.url.clone()));
        fields.insert(METHOD_FIELD.to_string(), Value::String(request.method.clone()));
        for (header, field) in &self.request_fields.fields {
            if let Some(value) = request.header(header) {
                fields.insert(field.clone(), Value::String(value.to_string()));
            }
        }

        Self {
            logger: self.logger.with_fields(fields),
            metrics: self.metrics.clone(),
            error_reports: self.error_reports.clone(),
            request_fields: Arc::clone(&self.request_fields),
        }
    }

    /// Run `work`, logging a panic instead of propagating it.
    pub fn recover_and_log<T>(&self, work: impl FnOnce() -> T) -> Option<T> {
        panic_guard::recover(self.logger.as_ref(), work)
    }

    pub async fn recover_and_log_async<F: Future>(&self, future: F) -> Option<F::Output> {
        panic_guard::recover_async(self.logger.as_ref(), future).await
    }

    /// Flush budget configured for the dispatcher, or the default when
    /// error tracking is off.
    pub fn flush_timeout(&self) -> Duration {
        self.error_reports
            .as_ref()
            .map_or(DEFAULT_FLUSH_TIMEOUT, |hook| hook.flush_timeout())
    }

    /// Drain the dispatcher, then push metrics, both within one `timeout`.
    /// Returns whether every queued error report was handed off and the
    /// final metrics push succeeded.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        let drained = match &self.error_reports {
            Some(hook) => hook.flush_within(timeout).await,
            None => true,
        };
        let pushed = match &self.metrics {
            Some(metrics) => {
                metrics
                    .flush(timeout.saturating_sub(started.elapsed()))
                    .await
            }
            None => true,
        };
        drained && pushed
    }
}
