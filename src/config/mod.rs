//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or environment variables
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ObservanceConfig (validated, immutable)
//!     → Observance::new builds logger, error tracking and metrics
//! ```
//!
//! # Design Decisions
//! - Config is read once at construction; the facade never re-reads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_env, load_config, parse_config};
pub use schema::{ErrorTrackingConfig, MetricsConfig, ObservanceConfig, RequestFieldConfig};
pub use validation::{validate_config, ValidationError};
