//! Structured errors attached to log contexts.

use std::error::Error;
use std::io;

use crate::observability::stacktrace::Stacktrace;

/// An error as seen by the logging pipeline: a type label, the rendered
/// message, and the stack trace it carries, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    type_name: String,
    message: String,
    stacktrace: Option<Stacktrace>,
}

impl ErrorReport {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stacktrace: None,
        }
    }

    /// Build a report from any error. The message joins the error with its
    /// `source()` chain. The type label is the kind of an `io::Error`,
    /// otherwise the leading identifier of its `Debug` form.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::new(type_name(err), message)
    }

    /// A minimal report synthesized from a bare log message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }

    pub fn with_stacktrace(mut self, stacktrace: Stacktrace) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stacktrace(&self) -> Option<&Stacktrace> {
        self.stacktrace.as_ref()
    }
}

fn type_name(err: &(dyn Error + 'static)) -> String {
    match err.downcast_ref::<io::Error>() {
        Some(io) => format!("{:?}", io.kind()),
        None => debug_type_name(err),
    }
}

// `Io(Custom { .. })` -> "Io", `ParseIntError { .. }` -> "ParseIntError"
fn debug_type_name(err: &dyn Error) -> String {
    let debug = format!("{err:?}");
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        "error".to_string()
    } else {
        name
    }
}
