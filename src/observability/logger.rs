//! Structured logger.
//!
//! # Responsibilities
//! - Emit leveled, field-annotated records as one JSON object per line
//! - Derive child contexts (`with_field`, `with_fields`, `with_error`)
//! - Hand qualifying records to registered hooks
//!
//! # Design Decisions
//! - A context is an immutable value; derivation clones a persistent map
//!   and bumps the `Arc` on the shared core (sink, hooks, threshold)
//! - Records below the threshold are never constructed
//! - `set_output` is the only mutation and acts on the shared sink

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::{ObservanceError, ObservanceResult};
use crate::observability::identity::process_identity;
use crate::observability::report::ErrorReport;
use crate::observability::severity::Severity;
use crate::observability::sink::SharedSink;

/// Field set of a log context. Cloning is O(1); updates share structure
/// with the original.
pub type Fields = im::OrdMap<String, Value>;

/// Field under which an attached error's message is recorded.
pub const ERROR_KEY: &str = "error";

const RESERVED_KEYS: [&str; 3] = ["level", "msg", "time"];

/// One emitted record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Severity,
    pub message: String,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
    pub error: Option<Arc<ErrorReport>>,
}

/// Receives every constructed record whose level is in `levels()`.
pub trait Hook: Send + Sync {
    fn levels(&self) -> &[Severity];

    fn fire(&self, record: &LogRecord);
}

/// Capability interface for structured logging.
pub trait Logger: Send + Sync {
    /// Minimum level that is emitted.
    fn level(&self) -> Severity;

    /// Emit a record, reporting sink failures.
    fn try_log(&self, level: Severity, message: &str) -> ObservanceResult<()>;

    fn with_field(&self, key: &str, value: Value) -> Arc<dyn Logger>;

    fn with_fields(&self, fields: Fields) -> Arc<dyn Logger>;

    fn with_error_report(&self, report: ErrorReport) -> Arc<dyn Logger>;

    /// Redirect the sink shared with the root context.
    fn set_output(&self, writer: Box<dyn Write + Send>);

    /// Snapshot of this context's fields.
    fn fields(&self) -> Fields;

    fn enabled(&self, level: Severity) -> bool {
        level >= self.level()
    }

    /// Emit a record. Sink failures are dropped.
    fn log(&self, level: Severity, message: &str) {
        let _ = self.try_log(level, message);
    }

    fn with_error(&self, err: &(dyn Error + 'static)) -> Arc<dyn Logger> {
        self.with_error_report(ErrorReport::from_error(err))
    }

    fn trace(&self, message: &str) {
        self.log(Severity::Trace, message);
    }

    fn debug(&self, message: &str) {
        self.log(Severity::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

struct LoggerCore {
    level: Severity,
    sink: SharedSink,
    hooks: Vec<Arc<dyn Hook>>,
}

/// Production logger writing JSON lines.
#[derive(Clone)]
pub struct JsonLogger {
    core: Arc<LoggerCore>,
    fields: Fields,
    error: Option<Arc<ErrorReport>>,
}

impl JsonLogger {
    /// Root logger for `app_name` writing to stdout.
    pub fn new(level: &str, app_name: &str) -> ObservanceResult<Self> {
        Ok(Self::builder(level.parse()?, app_name).build())
    }

    pub fn builder(level: Severity, app_name: &str) -> JsonLoggerBuilder {
        JsonLoggerBuilder {
            level,
            app_name: app_name.to_string(),
            sink: SharedSink::stdout(),
            hooks: Vec::new(),
        }
    }

    fn derive(&self, fields: Fields, error: Option<Arc<ErrorReport>>) -> Arc<dyn Logger> {
        Arc::new(Self {
            core: Arc::clone(&self.core),
            fields,
            error,
        })
    }

    fn fire_hooks(&self, record: &LogRecord) {
        for hook in &self.core.hooks {
            if hook.levels().contains(&record.level) {
                hook.fire(record);
            }
        }
    }
}

impl Logger for JsonLogger {
    fn level(&self) -> Severity {
        self.core.level
    }

    fn try_log(&self, level: Severity, message: &str) -> ObservanceResult<()> {
        if level < self.core.level {
            return Ok(());
        }

        let record = LogRecord {
            level,
            message: message.to_string(),
            fields: self.fields.clone(),
            timestamp: Utc::now(),
            error: self.error.clone(),
        };

        self.fire_hooks(&record);

        let mut line = render_line(&record);
        line.push('\n');
        self.core
            .sink
            .write_line(line.as_bytes())
            .map_err(ObservanceError::SinkWrite)
    }

    fn with_field(&self, key: &str, value: Value) -> Arc<dyn Logger> {
        self.derive(self.fields.update(key.to_string(), value), self.error.clone())
    }

    fn with_fields(&self, fields: Fields) -> Arc<dyn Logger> {
        let mut merged = self.fields.clone();
        for (key, value) in fields {
            merged.insert(key, value);
        }
        self.derive(merged, self.error.clone())
    }

    fn with_error_report(&self, report: ErrorReport) -> Arc<dyn Logger> {
        let fields = self
            .fields
            .update(ERROR_KEY.to_string(), Value::String(report.message().to_string()));
        self.derive(fields, Some(Arc::new(report)))
    }

    fn set_output(&self, writer: Box<dyn Write + Send>) {
        self.core.sink.replace(writer);
    }

    fn fields(&self) -> Fields {
        self.fields.clone()
    }
}

/// Builder for a root [`JsonLogger`]. Hooks can only be registered here,
/// before the logger is shared.
pub struct JsonLoggerBuilder {
    level: Severity,
    app_name: String,
    sink: SharedSink,
    hooks: Vec<Arc<dyn Hook>>,
}

impl JsonLoggerBuilder {
    pub fn output(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.sink = SharedSink::new(writer);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> JsonLogger {
        let identity = process_identity();
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::String(self.app_name));
        fields.insert("pid".to_string(), Value::from(identity.pid));
        fields.insert("hostname".to_string(), Value::String(identity.hostname.clone()));

        JsonLogger {
            core: Arc::new(LoggerCore {
                level: self.level,
                sink: self.sink,
                hooks: self.hooks,
            }),
            fields,
            error: None,
        }
    }
}

/// Render a record as a single JSON object. Fields that collide with the
/// reserved keys are kept as `fields.<key>`.
pub fn render_line(record: &LogRecord) -> String {
    let mut payload = Map::new();
    for (key, value) in &record.fields {
        if RESERVED_KEYS.contains(&key.as_str()) {
            payload.insert(format!("fields.{key}"), value.clone());
        } else {
            payload.insert(key.clone(), value.clone());
        }
    }
    payload.insert("level".to_string(), Value::String(record.level.to_string()));
    payload.insert("msg".to_string(), Value::String(record.message.clone()));
    payload.insert(
        "time".to_string(),
        Value::String(record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    );

    serde_json::to_string(&Value::Object(payload)).unwrap_or_else(|_| {
        r#"{"level":"error","msg":"log serialization failed"}"#.to_string()
    })
}
