//! Stack trace capture and dependency frame filtering.
//!
//! Frames are kept innermost first, the order `std::backtrace` prints them.
//! The collector protocol lists frames oldest first, so serialization
//! reverses them.

use std::backtrace::Backtrace;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Path fragments that identify frames from third-party code and the
/// toolchain's standard library.
pub const DEFAULT_DEPENDENCY_MARKERS: &[&str] =
    &["/.cargo/registry/", "/.cargo/git/", "/vendor/", "/rustc/"];

/// A single stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub function: String,
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(rename = "lineno", skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// Whether the frame's source path contains any of `markers`.
    /// Frames without a resolved path never match.
    pub fn is_dependency<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        let Some(file) = self.file.as_deref() else {
            return false;
        };
        let normalized = file.replace('\\', "/");
        markers
            .iter()
            .any(|marker| normalized.contains(marker.as_ref()))
    }
}

/// Ordered sequence of frames, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Capture the current thread's stack, regardless of `RUST_BACKTRACE`.
    pub fn capture() -> Self {
        Self::parse(&Backtrace::force_capture().to_string())
    }

    /// Parse the textual form of a `std::backtrace::Backtrace`.
    ///
    /// ```text
    ///    3: app::handler::create
    ///              at ./src/handler.rs:42:9
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<Frame> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(location) = trimmed.strip_prefix("at ") {
                if let Some(frame) = frames.last_mut() {
                    let (file, line) = split_location(location);
                    frame.file = Some(file);
                    frame.line = line;
                }
            } else if let Some((index, function)) = trimmed.split_once(": ") {
                if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                    frames.push(Frame {
                        function: strip_symbol_hash(function).to_string(),
                        file: None,
                        line: None,
                    });
                }
            }
        }

        Self { frames }
    }

    /// A copy without dependency frames. Remaining frames keep their
    /// relative order; nothing is reordered or deduplicated.
    pub fn without_dependency_frames<S: AsRef<str>>(&self, markers: &[S]) -> Self {
        Self {
            frames: self
                .frames
                .iter()
                .filter(|frame| !frame.is_dependency(markers))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Serialize for Stacktrace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let oldest_first: Vec<&Frame> = self.frames.iter().rev().collect();
        let mut state = serializer.serialize_struct("Stacktrace", 1)?;
        state.serialize_field("frames", &oldest_first)?;
        state.end()
    }
}

impl fmt::Display for Stacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{index:>4}: {}", frame.function)?;
            match (&frame.file, frame.line) {
                (Some(file), Some(line)) => writeln!(f, "             at {file}:{line}")?,
                (Some(file), None) => writeln!(f, "             at {file}")?,
                _ => {}
            }
        }
        Ok(())
    }
}

// "path/to/file.rs:42:9" -> ("path/to/file.rs", Some(42))
fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next();
    let line = parts.next();
    let path = parts.next();

    match (path, line, column) {
        (Some(path), Some(line), Some(_)) => match line.parse() {
            Ok(line) => (path.to_string(), Some(line)),
            Err(_) => (location.to_string(), None),
        },
        _ => (location.to_string(), None),
    }
}

// Legacy mangling appends "::h" + 16 hex digits.
fn strip_symbol_hash(function: &str) -> &str {
    match function.rsplit_once("::h") {
        Some((name, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            name
        }
        _ => function,
    }
}
