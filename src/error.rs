//! Error taxonomy for the observability core.
//!
//! Construction-time failures (`InvalidLevel`, `InvalidConfig`, `Io`, `Parse`)
//! are reported to bootstrap code. `Delivery` never reaches logging callers;
//! it only travels between the transport worker and its diagnostics.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors produced by the observability core.
#[derive(Debug, Error)]
pub enum ObservanceError {
    /// A severity name could not be parsed.
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    /// Construction input was rejected.
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// A remote submission failed.
    #[error("error event delivery failed: {0}")]
    Delivery(String),

    /// The log sink could not be written.
    #[error("log sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[source] std::io::Error),

    /// The configuration file is not valid TOML for the schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ObservanceError {
    /// Wrap a single validation failure.
    pub fn invalid_config(error: ValidationError) -> Self {
        Self::InvalidConfig(vec![error])
    }
}

/// Result alias used across the crate.
pub type ObservanceResult<T> = Result<T, ObservanceError>;

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
