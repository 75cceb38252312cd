//! Error-report events sent to the collector.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::observability::severity::RemoteSeverity;
use crate::observability::stacktrace::Stacktrace;

/// A fully assembled event. Owns all of its data, so nothing that happens to
/// the originating record or logger afterwards can change it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: RemoteSeverity,
    pub logger: String,
    pub platform: String,
    pub message: String,
    pub extra: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    pub exception: ExceptionList,
    /// Always empty; module lists only add noise to reports.
    pub modules: BTreeMap<String, String>,
}

impl ErrorEvent {
    pub fn new(level: RemoteSeverity, message: impl Into<String>, exception: Exception) -> Self {
        Self {
            event_id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now(),
            level,
            logger: env!("CARGO_PKG_NAME").to_string(),
            platform: "rust".to_string(),
            message: message.into(),
            extra: BTreeMap::new(),
            tags: BTreeMap::new(),
            environment: None,
            release: None,
            exception: ExceptionList {
                values: vec![exception],
            },
            modules: BTreeMap::new(),
        }
    }

    /// The primary exception.
    pub fn exception(&self) -> Option<&Exception> {
        self.exception.values.first()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionList {
    pub values: Vec<Exception>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub stacktrace: Stacktrace,
}
