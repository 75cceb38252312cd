//! Shared output sink for log lines.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

type Writer = Box<dyn Write + Send>;

/// A byte-stream destination shared by every context derived from one root
/// logger. Each line is written under the lock in a single `write_all`, so
/// concurrent records never interleave.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Writer>>,
}

impl SharedSink {
    pub fn new(writer: Writer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write one complete line.
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.lock();
        writer.write_all(line)?;
        writer.flush()
    }

    /// Redirect every holder of this sink to `writer`.
    pub fn replace(&self, writer: Writer) {
        *self.lock() = writer;
    }

    // A panic while holding the lock leaves the writer usable.
    fn lock(&self) -> MutexGuard<'_, Writer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SharedSink {
    fn default() -> Self {
        Self::stdout()
    }
}

/// In-memory writer, cloneable so a test can keep a handle to what a logger
/// writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
