//! Service observability: structured JSON logging, panic recovery, remote
//! error reporting and pushed metrics behind one facade.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ObservanceConfig;
pub use error::{ObservanceError, ObservanceResult};
pub use lifecycle::Shutdown;
pub use observability::{Logger, Observance, Severity};
