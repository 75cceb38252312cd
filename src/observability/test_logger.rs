//! In-memory logger for assertions in tests.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::ObservanceResult;
use crate::observability::logger::{Fields, Logger, ERROR_KEY};
use crate::observability::report::ErrorReport;
use crate::observability::severity::Severity;

/// A record kept by [`TestLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct TestEntry {
    pub level: Severity,
    pub message: String,
    pub fields: Fields,
}

/// Logger that keeps every emitted entry in memory. Derived loggers share
/// the entry log with their root.
#[derive(Clone)]
pub struct TestLogger {
    entries: Arc<Mutex<Vec<TestEntry>>>,
    level: Severity,
    fields: Fields,
    error: Option<Arc<ErrorReport>>,
}

impl TestLogger {
    pub fn new() -> Self {
        Self::with_level(Severity::Trace)
    }

    pub fn with_level(level: Severity) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            level,
            fields: Fields::new(),
            error: None,
        }
    }

    pub fn entries(&self) -> Vec<TestEntry> {
        self.lock().clone()
    }

    pub fn last_entry(&self) -> Option<TestEntry> {
        self.lock().last().cloned()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn derive(&self, fields: Fields, error: Option<Arc<ErrorReport>>) -> Arc<dyn Logger> {
        Arc::new(Self {
            entries: Arc::clone(&self.entries),
            level: self.level,
            fields,
            error,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TestEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for TestLogger {
    fn level(&self) -> Severity {
        self.level
    }

    fn try_log(&self, level: Severity, message: &str) -> ObservanceResult<()> {
        if level >= self.level {
            self.lock().push(TestEntry {
                level,
                message: message.to_string(),
                fields: self.fields.clone(),
            });
        }
        Ok(())
    }

    fn with_field(&self, key: &str, value: Value) -> Arc<dyn Logger> {
        self.derive(self.fields.update(key.to_string(), value), self.error.clone())
    }

    fn with_fields(&self, fields: Fields) -> Arc<dyn Logger> {
        // left operand wins on collisions
        self.derive(fields.union(self.fields.clone()), self.error.clone())
    }

    fn with_error_report(&self, report: ErrorReport) -> Arc<dyn Logger> {
        let fields = self
            .fields
            .update(ERROR_KEY.to_string(), Value::String(report.message().to_string()));
        self.derive(fields, Some(Arc::new(report)))
    }

    fn set_output(&self, _writer: Box<dyn Write + Send>) {}

    fn fields(&self) -> Fields {
        self.fields.clone()
    }
}
