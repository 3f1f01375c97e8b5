//! Log sinks for connection events.
//!
//! A connection renders each event to a single line and hands it to the
//! configured [`LogSink`]. The default sink forwards to `tracing`.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Receiver of connection log lines.
pub trait LogSink: Send + Sync {
    /// Record one line. Lines carry no trailing newline.
    fn log(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, line: &str) {
        self(line);
    }
}

/// Discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&self, _line: &str) {}
}

/// Emits each line as a `tracing` DEBUG event under the `pollws` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, line: &str) {
        tracing::debug!(target: "pollws", "{line}");
    }
}

/// Writes lines to standard error, optionally prefixed.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    prefix: String,
}

impl ConsoleSink {
    /// Create a sink that prefixes every line with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl LogSink for ConsoleSink {
    fn log(&self, line: &str) {
        eprintln!("{}{line}", self.prefix);
    }
}

/// Appends lines to a file.
#[derive(Debug)]
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl LogSink for FileSink {
    fn log(&self, line: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        // Logging must never fail the connection.
        let _ = writeln!(writer, "{line}").and_then(|()| writer.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_sink() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink = move |line: &str| captured.lock().unwrap().push(line.to_owned());

        sink.log("first");
        sink.log("second");

        assert_eq!(*lines.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.log");

        let sink = FileSink::open(&path).unwrap();
        sink.log("opened");
        sink.log("closed");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "opened\nclosed\n");
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<Box<dyn LogSink>> = vec![
            Box::new(NoopSink),
            Box::new(TracingSink),
            Box::new(ConsoleSink::with_prefix("@@ ")),
        ];
        for sink in &sinks {
            sink.log("line");
        }
    }
}
