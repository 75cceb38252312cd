//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Application code
//!     → facade.rs (Observance: logger + optional metrics)
//!     → logger.rs (JSON line per record, child contexts)
//!         → sink.rs (shared output)
//!         → hook.rs (error-level records)
//!             → stacktrace.rs (dependency frames dropped)
//!             → event.rs → transport.rs (bounded queue, HTTP delivery)
//!     → metrics.rs (counters, gauges, histograms pushed on an interval)
//!
//! Handlers
//!     → panic_guard.rs (panic → one error record, never re-raised)
//! ```
//!
//! # Design Decisions
//! - Log contexts are immutable values sharing one sink and hook set
//! - Remote reporting never blocks or fails the logging call
//! - Only `flush` waits, and only up to its timeout

pub mod dsn;
pub mod event;
pub mod facade;
pub mod hook;
pub mod identity;
pub mod logger;
pub mod metrics;
pub mod panic_guard;
pub mod report;
pub mod severity;
pub mod sink;
pub mod stacktrace;
pub mod test_logger;
pub mod transport;

pub use facade::Observance;
pub use hook::ErrorReportHook;
pub use logger::{Fields, Hook, JsonLogger, LogRecord, Logger};
pub use metrics::{InMemoryMetrics, MetricsReporter, PushGatewayReporter};
pub use panic_guard::{recover, recover_async};
pub use report::ErrorReport;
pub use severity::Severity;
pub use test_logger::TestLogger;
