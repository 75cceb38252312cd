//! Asynchronous event delivery.
//!
//! # Responsibilities
//! - Accept events from logging call sites without blocking them
//! - Deliver them one by one on a background tokio task
//! - Let shutdown wait, bounded, for the queue to drain
//!
//! # Design Decisions
//! - Bounded mpsc queue; a full queue drops the event (at-most-once)
//! - `pending` counts submitted but unfinished events, so `flush` covers
//!   the event currently in flight as well as the queued ones
//! - Delivery failures are reported through `tracing` only

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use crate::config::ValidationError;
use crate::error::{ObservanceError, ObservanceResult};
use crate::observability::dsn::Dsn;
use crate::observability::event::ErrorEvent;

/// Header carrying collector credentials.
pub const AUTH_HEADER: &str = "X-Sentry-Auth";

/// Sends a single event to its destination.
pub trait Deliver: Send + Sync + 'static {
    fn deliver(&self, event: ErrorEvent) -> impl Future<Output = ObservanceResult<()>> + Send;
}

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    drained: Notify,
}

impl Pending {
    fn finish_one(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Handle to the background delivery worker. Dropping the last handle
/// closes the queue; the worker exits once it is empty.
#[derive(Clone)]
pub struct AsyncTransport {
    tx: mpsc::Sender<ErrorEvent>,
    pending: Arc<Pending>,
}

impl AsyncTransport {
    /// Start a worker on the current tokio runtime.
    pub fn spawn<D: Deliver>(deliver: D, capacity: usize) -> ObservanceResult<Self> {
        let handle = Handle::try_current()
            .map_err(|_| ObservanceError::invalid_config(ValidationError::RuntimeUnavailable))?;
        if capacity == 0 {
            return Err(ObservanceError::invalid_config(ValidationError::ZeroQueueCapacity));
        }

        let (tx, rx) = mpsc::channel(capacity);
        let pending = Arc::new(Pending::default());
        handle.spawn(run_worker(deliver, rx, Arc::clone(&pending)));

        Ok(Self { tx, pending })
    }

    /// Queue an event. Never blocks; the event is dropped if the queue is
    /// full or the worker is gone.
    pub fn submit(&self, event: ErrorEvent) {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        if let Err(err) = self.tx.try_send(event) {
            self.pending.finish_one();
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            };
            tracing::debug!(reason, "Dropping error event");
        }
    }

    /// Events submitted but not yet delivered or dropped.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Wait until every submitted event is finished or `timeout` elapses.
    /// Returns whether the queue drained.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let drained = self.pending.drained.notified();
            if self.pending() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                let left = self.pending();
                if left > 0 {
                    tracing::debug!(pending = left, "Flush timed out");
                }
                return left == 0;
            }
        }
    }
}

async fn run_worker<D: Deliver>(deliver: D, mut rx: mpsc::Receiver<ErrorEvent>, pending: Arc<Pending>) {
    while let Some(event) = rx.recv().await {
        let event_id = event.event_id.clone();
        if let Err(err) = deliver.deliver(event).await {
            tracing::warn!(event_id = %event_id, error = %err, "Failed to deliver error event");
        }
        pending.finish_one();
    }
    tracing::debug!("Error event worker stopped");
}

/// Posts events to the collector's store endpoint.
pub struct HttpDelivery {
    client: reqwest::Client,
    store_url: String,
    auth_header: String,
}

impl HttpDelivery {
    pub fn new(dsn: &Dsn, timeout: Duration) -> ObservanceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObservanceError::invalid_config(ValidationError::HttpClient(e.to_string())))?;

        Ok(Self {
            client,
            store_url: dsn.store_url(),
            auth_header: dsn.auth_header(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
        })
    }
}

impl Deliver for HttpDelivery {
    async fn deliver(&self, event: ErrorEvent) -> ObservanceResult<()> {
        let response = self
            .client
            .post(&self.store_url)
            .header(AUTH_HEADER, &self.auth_header)
            .json(&event)
            .send()
            .await
            .map_err(|e| ObservanceError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ObservanceError::Delivery(format!("collector responded {status}")))
        }
    }
}

/// Keeps delivered events in memory.
#[derive(Clone, Default)]
pub struct MemoryDelivery {
    events: Arc<Mutex<Vec<ErrorEvent>>>,
    delay: Duration,
}

impl MemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every delivery by `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ErrorEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Deliver for MemoryDelivery {
    async fn deliver(&self, event: ErrorEvent) -> ObservanceResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
        Ok(())
    }
}
