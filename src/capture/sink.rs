//! Dual-sink emission: full text to the log file, a preview to the terminal.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::buffer::Record;
use crate::config::{CaptureSection, DEFAULT_PREVIEW_WIDTH};
use crate::error::{CaptureError, Result};

const ELLIPSIS: &str = "...";

/// Shorten `text` to at most `width` characters.
///
/// Text longer than `width` keeps its first `width - 3` characters followed
/// by `...`. Trailing newlines are removed first. Counts are in `char`s.
pub fn truncate_preview(text: &str, width: usize) -> String {
    let text = text.trim_end_matches('\n');
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Writes each record to the log file and to a terminal stream.
pub struct DualSinkWriter<T: Write> {
    log_file: Option<PathBuf>,
    terminal: T,
    preview_width: usize,
}

impl<T: Write> DualSinkWriter<T> {
    /// Create a writer from the capture configuration.
    pub fn new(config: &CaptureSection, terminal: T) -> Self {
        Self {
            log_file: config.log_file.clone(),
            terminal,
            preview_width: config.preview_width,
        }
    }

    /// Create a writer with an explicit log path and the default width.
    pub fn with_log_file(log_file: impl Into<PathBuf>, terminal: T) -> Self {
        Self {
            log_file: Some(log_file.into()),
            terminal,
            preview_width: DEFAULT_PREVIEW_WIDTH,
        }
    }

    /// Configured log file, if any.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Terminal stream.
    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Consume the writer, returning the terminal stream.
    pub fn into_terminal(self) -> T {
        self.terminal
    }

    /// Emit one record to both sinks.
    ///
    /// The log entry is appended and flushed before the preview is written.
    pub fn emit(&mut self, record: &Record) -> Result<()> {
        self.append_log(record)?;

        let preview = truncate_preview(&record.text, self.preview_width);
        debug!(
            command = ?record.command,
            bytes = record.text.len(),
            truncated = preview.len() != record.text.len(),
            "record emitted"
        );

        write!(self.terminal, "[{}]\n{}\n\n", record.timestamp, preview)
            .and_then(|_| self.terminal.flush())
            .map_err(CaptureError::TerminalWrite)
    }

    fn append_log(&self, record: &Record) -> Result<()> {
        let path = self
            .log_file
            .as_deref()
            .ok_or(CaptureError::LogFileNotConfigured)?;

        let to_err = |source: std::io::Error| CaptureError::LogWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(to_err)?;
        write!(file, "[{}]\n{}\n", record.timestamp, record.text).map_err(to_err)?;
        file.flush().map_err(to_err)
    }
}
