//! Shutdown coordination for the observed service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::observability::Observance;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to,
/// and runs the final observability flush once.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    flushed: AtomicBool,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            flushed: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Flush `observance`, waiting at most `timeout`. Only the first call
    /// flushes; later calls return `true` immediately.
    pub async fn graceful_flush(&self, observance: &Observance, timeout: Duration) -> bool {
        if self.flushed.swap(true, Ordering::AcqRel) {
            return true;
        }

        let flushed = observance.flush(timeout).await;
        if flushed {
            tracing::info!("Observability flushed");
        } else {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Flush incomplete, pending reports dropped");
        }
        flushed
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{InMemoryMetrics, TestLogger};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_graceful_flush_runs_once() {
        let metrics = InMemoryMetrics::new();
        let observance = Observance::from_parts(Arc::new(TestLogger::new()), Some(Arc::new(metrics.clone())));
        let shutdown = Shutdown::new();

        assert!(shutdown.graceful_flush(&observance, Duration::from_millis(50)).await);
        assert!(shutdown.graceful_flush(&observance, Duration::from_millis(50)).await);
        assert_eq!(metrics.flush_count(), 1);
    }
}
