//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Flush observability (bounded) → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown flush has a timeout: undelivered error reports are dropped
//! - The flush runs at most once per process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{shutdown_signal, trigger_on_signal};
