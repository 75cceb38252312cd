//! Error-report dispatcher.
//!
//! A logger [`Hook`] that turns error-level records into collector events
//! and hands them to the [`AsyncTransport`]. Firing never blocks the
//! logging call site and never fails visibly.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ObservanceConfig;
use crate::error::ObservanceResult;
use crate::observability::dsn::Dsn;
use crate::observability::event::{ErrorEvent, Exception};
use crate::observability::logger::{Hook, LogRecord};
use crate::observability::report::ErrorReport;
use crate::observability::severity::Severity;
use crate::observability::stacktrace::{Stacktrace, DEFAULT_DEPENDENCY_MARKERS};
use crate::observability::transport::{AsyncTransport, Deliver, HttpDelivery};

/// Flush budget used when none is configured.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_QUEUE_CAPACITY: usize = 100;

pub struct ErrorReportHook {
    transport: AsyncTransport,
    levels: Vec<Severity>,
    prefix: String,
    tags: BTreeMap<String, String>,
    environment: Option<String>,
    release: Option<String>,
    flush_timeout: Duration,
    dependency_markers: Vec<String>,
}

impl ErrorReportHook {
    /// Hook delivering through `deliver`, reporting `levels`.
    /// Must be called within a tokio runtime.
    pub fn new<D: Deliver>(deliver: D, levels: Vec<Severity>) -> ObservanceResult<Self> {
        Self::with_capacity(deliver, levels, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity<D: Deliver>(
        deliver: D,
        levels: Vec<Severity>,
        capacity: usize,
    ) -> ObservanceResult<Self> {
        Ok(Self {
            transport: AsyncTransport::spawn(deliver, capacity)?,
            levels,
            prefix: String::new(),
            tags: BTreeMap::new(),
            environment: None,
            release: None,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            dependency_markers: DEFAULT_DEPENDENCY_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        })
    }

    /// Hook posting to the collector behind `dsn`, set up from `config`.
    pub fn from_config(dsn: &Dsn, config: &ObservanceConfig) -> ObservanceResult<Self> {
        let tracking = &config.error_tracking;
        let levels = tracking
            .levels
            .iter()
            .map(|level| level.parse())
            .collect::<ObservanceResult<Vec<Severity>>>()?;

        let delivery = HttpDelivery::new(dsn, Duration::from_millis(tracking.send_timeout_ms))?;
        let mut hook = Self::with_capacity(delivery, levels, tracking.queue_capacity)?;
        hook.set_prefix(&tracking.message_prefix);
        hook.set_tags(tracking.tags.clone());
        hook.set_environment(config.environment.clone());
        hook.set_release(config.version.clone());
        hook.set_flush_timeout(Duration::from_millis(tracking.flush_timeout_ms));
        hook.set_dependency_markers(tracking.dependency_markers.clone());
        Ok(hook)
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    pub fn set_tags(&mut self, tags: BTreeMap<String, String>) {
        self.tags = tags;
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    pub fn set_environment(&mut self, environment: Option<String>) {
        self.environment = environment;
    }

    pub fn set_release(&mut self, release: Option<String>) {
        self.release = release;
    }

    pub fn set_flush_timeout(&mut self, timeout: Duration) {
        self.flush_timeout = timeout;
    }

    pub fn set_dependency_markers(&mut self, markers: Vec<String>) {
        self.dependency_markers = markers;
    }

    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Assemble the event for `record`, or `None` when there is nothing to
    /// report (no attached error and an empty message).
    pub fn build_event(&self, record: &LogRecord) -> Option<ErrorEvent> {
        let report = match &record.error {
            Some(report) => report.as_ref().clone(),
            None if !record.message.is_empty() => ErrorReport::from_message(record.message.clone()),
            None => return None,
        };

        let stacktrace = report
            .stacktrace()
            .cloned()
            .unwrap_or_else(Stacktrace::capture)
            .without_dependency_frames(&self.dependency_markers);

        let message = if record.message.is_empty() {
            report.message()
        } else {
            record.message.as_str()
        };

        let exception = Exception {
            kind: report.type_name().to_string(),
            value: report.message().to_string(),
            stacktrace,
        };

        let mut event = ErrorEvent::new(
            record.level.to_remote(),
            format!("{}{}", self.prefix, message),
            exception,
        );
        event.timestamp = record.timestamp;
        event.extra = record
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        event.tags = self.tags.clone();
        event.environment = self.environment.clone();
        event.release = self.release.clone();
        Some(event)
    }

    /// Wait at most `timeout` for queued events.
    pub async fn flush_within(&self, timeout: Duration) -> bool {
        self.transport.flush(timeout).await
    }
}

impl Hook for ErrorReportHook {
    fn levels(&self) -> &[Severity] {
        &self.levels
    }

    fn fire(&self, record: &LogRecord) {
        if let Some(event) = self.build_event(record) {
            self.transport.submit(event);
        }
    }
}
