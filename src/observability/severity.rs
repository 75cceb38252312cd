//! Severity model.
//!
//! Two taxonomies meet here: the local log levels, which gate output, and
//! the coarser levels understood by the error-tracking collector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ObservanceError;

/// Log level, ordered by increasing criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Severity {
    /// Every level, least critical first.
    pub const ALL: [Severity; 7] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
        Severity::Panic,
    ];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        }
    }

    /// Map onto the collector's taxonomy. `Trace` folds into `Debug` and
    /// `Panic` into `Fatal`; no level is left unmapped.
    pub fn to_remote(self) -> RemoteSeverity {
        match self {
            Severity::Trace | Severity::Debug => RemoteSeverity::Debug,
            Severity::Info => RemoteSeverity::Info,
            Severity::Warn => RemoteSeverity::Warning,
            Severity::Error => RemoteSeverity::Error,
            Severity::Fatal | Severity::Panic => RemoteSeverity::Fatal,
        }
    }

    /// All levels at or above `self`.
    pub fn and_above(self) -> Vec<Severity> {
        Self::ALL.into_iter().filter(|level| *level >= self).collect()
    }
}

impl FromStr for Severity {
    type Err = ObservanceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            "panic" => Ok(Severity::Panic),
            _ => Err(ObservanceError::InvalidLevel(name.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Level understood by the error-tracking collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}
