//! Metrics reporting.
//!
//! # Responsibilities
//! - Record counters, gauges and histograms with string labels
//! - Push the Prometheus text exposition to a gateway periodically
//! - Push immediately on `flush`, waiting for the push up to a timeout
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): request latency
//!
//! # Design Decisions
//! - Each reporter owns its recorder; nothing is installed globally
//! - Periodic pushes run on a tokio interval task; only `flush` pushes on
//!   the caller
//! - A failed push is reported through `tracing` and retried on the next
//!   tick

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::task::JoinHandle;

use crate::config::ValidationError;
use crate::error::{ObservanceError, ObservanceResult};

/// Label set attached to a single sample.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Capability interface for metrics.
pub trait MetricsReporter: Send + Sync {
    fn increment_counter(&self, name: &str, value: u64, labels: Labels<'_>);

    fn set_gauge(&self, name: &str, value: f64, labels: Labels<'_>);

    fn record_histogram(&self, name: &str, value: f64, labels: Labels<'_>);

    /// Push everything recorded so far, waiting at most `timeout`.
    /// Returns whether the push completed successfully in time.
    fn flush(&self, timeout: Duration) -> BoxFuture<'_, bool>;
}

fn to_labels(labels: Labels<'_>) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(key.to_string(), value.to_string()))
        .collect()
}

/// Reporter pushing to a Prometheus push gateway.
pub struct PushGatewayReporter {
    recorder: PrometheusRecorder,
    pusher: Arc<Pusher>,
    task: JoinHandle<()>,
}

impl PushGatewayReporter {
    /// Start pushing to `<endpoint>/metrics/job/<app_name>` every `interval`.
    /// Must be called within a tokio runtime.
    pub fn spawn(
        endpoint: &str,
        app_name: &str,
        interval: Duration,
    ) -> ObservanceResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ObservanceError::invalid_config(ValidationError::RuntimeUnavailable))?;
        if interval.is_zero() {
            return Err(ObservanceError::invalid_config(ValidationError::ZeroFlushInterval));
        }

        let recorder = PrometheusBuilder::new()
            .add_global_label("app", app_name)
            .build_recorder();
        let client = reqwest::Client::builder()
            .timeout(interval.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ObservanceError::invalid_config(ValidationError::HttpClient(e.to_string())))?;

        let pusher = Arc::new(Pusher {
            client,
            url: push_url(endpoint, app_name),
            handle: recorder.handle(),
        });
        let task = runtime.spawn(Arc::clone(&pusher).run(interval));

        Ok(Self {
            recorder,
            pusher,
            task,
        })
    }

    /// Current exposition text.
    pub fn render(&self) -> String {
        self.recorder.handle().render()
    }
}

impl MetricsReporter for PushGatewayReporter {
    fn increment_counter(&self, name: &str, value: u64, labels: Labels<'_>) {
        let labels = to_labels(labels);
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(name.to_string(), labels).increment(value);
        });
    }

    fn set_gauge(&self, name: &str, value: f64, labels: Labels<'_>) {
        let labels = to_labels(labels);
        metrics::with_local_recorder(&self.recorder, || {
            metrics::gauge!(name.to_string(), labels).set(value);
        });
    }

    fn record_histogram(&self, name: &str, value: f64, labels: Labels<'_>) {
        let labels = to_labels(labels);
        metrics::with_local_recorder(&self.recorder, || {
            metrics::histogram!(name.to_string(), labels).record(value);
        });
    }

    fn flush(&self, timeout: Duration) -> BoxFuture<'_, bool> {
        async move {
            match tokio::time::timeout(timeout, self.pusher.push()).await {
                Ok(pushed) => pushed,
                Err(_) => {
                    tracing::warn!(url = %self.pusher.url, "Metrics flush timed out");
                    false
                }
            }
        }
        .boxed()
    }
}

impl Drop for PushGatewayReporter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn push_url(endpoint: &str, app_name: &str) -> String {
    format!("{}/metrics/job/{}", endpoint.trim_end_matches('/'), app_name)
}

struct Pusher {
    client: reqwest::Client,
    url: String,
    handle: PrometheusHandle,
}

impl Pusher {
    async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.push().await;
        }
    }

    async fn push(&self) -> bool {
        self.handle.run_upkeep();
        let body = self.handle.render();

        let result = self
            .client
            .put(&self.url)
            .header("content-type", "text/plain; version=0.0.4")
            .body(body)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                tracing::trace!(url = %self.url, "Pushed metrics");
                true
            }
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "Metrics push failed");
                false
            }
        }
    }
}

/// A recorded sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Recorded {
    counters: Vec<Sample>,
    gauges: Vec<Sample>,
    histograms: Vec<Sample>,
    flushes: usize,
}

/// Reporter keeping every sample in memory.
#[derive(Clone, Default)]
pub struct InMemoryMetrics {
    recorded: Arc<Mutex<Recorded>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> Vec<Sample> {
        self.with(|r| r.counters.clone())
    }

    pub fn gauges(&self) -> Vec<Sample> {
        self.with(|r| r.gauges.clone())
    }

    pub fn histograms(&self) -> Vec<Sample> {
        self.with(|r| r.histograms.clone())
    }

    /// Sum of every increment of counter `name`.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.with(|r| {
            r.counters
                .iter()
                .filter(|s| s.name == name)
                .map(|s| s.value as u64)
                .sum()
        })
    }

    pub fn flush_count(&self) -> usize {
        self.with(|r| r.flushes)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        let mut recorded = self.recorded.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut recorded)
    }
}

fn sample(name: &str, value: f64, labels: Labels<'_>) -> Sample {
    Sample {
        name: name.to_string(),
        value,
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl MetricsReporter for InMemoryMetrics {
    fn increment_counter(&self, name: &str, value: u64, labels: Labels<'_>) {
        self.with(|r| r.counters.push(sample(name, value as f64, labels)));
    }

    fn set_gauge(&self, name: &str, value: f64, labels: Labels<'_>) {
        self.with(|r| r.gauges.push(sample(name, value, labels)));
    }

    fn record_histogram(&self, name: &str, value: f64, labels: Labels<'_>) {
        self.with(|r| r.histograms.push(sample(name, value, labels)));
    }

    fn flush(&self, _timeout: Duration) -> BoxFuture<'_, bool> {
        self.with(|r| r.flushes += 1);
        future::ready(true).boxed()
    }
}
