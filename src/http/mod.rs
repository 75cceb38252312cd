//! HTTP integration.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request id set/propagated (tower-http)
//!     → middleware/observe.rs (request-scoped Observance, metrics, panic → 500)
//!     → handler (Extension<Observance>)
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::observe_request;
pub use request::{RequestMetadata, X_ACCOUNT_ID, X_REQUEST_ID};
pub use server::HttpServer;
