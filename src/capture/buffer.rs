//! In-flight byte buffer and the records it produces.

use chrono::{DateTime, Local};
use tracing::{debug, trace};

use super::filter::discard_reason;

/// Timestamp layout used by both sinks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A finalized, immutable capture record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Local wall-clock time of the flush, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// Decoded text with trailing whitespace removed.
    pub text: String,
    /// Command that was open when the record was flushed.
    pub command: Option<String>,
}

impl Record {
    /// Build a record from raw bytes.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn from_bytes(raw: &[u8], at: DateTime<Local>, command: Option<String>) -> Self {
        let text = String::from_utf8_lossy(raw).trim_end().to_string();
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            text,
            command,
        }
    }
}

/// Owns the bytes of the record currently being captured.
///
/// At most one buffer is live; every flush, whether it emits or discards,
/// leaves it empty.
#[derive(Debug, Default)]
pub struct BufferAccumulator {
    buffer: Vec<u8>,
}

impl BufferAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the live buffer. No size cap.
    pub fn append(&mut self, chunk: &[u8]) {
        trace!(bytes = chunk.len(), "buffer append");
        self.buffer.extend_from_slice(chunk);
    }

    /// Drop pending bytes without emitting them.
    pub fn clear(&mut self) {
        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "pending bytes dropped");
        }
        self.buffer.clear();
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Finalize the pending bytes, stamped with the current local time.
    pub fn flush(&mut self, command: Option<&str>) -> Option<Record> {
        self.flush_at(Local::now(), command)
    }

    /// Finalize the pending bytes with an explicit timestamp.
    ///
    /// Returns `None` if the buffer was empty or held a terminal control
    /// sequence. The buffer is empty afterwards in every case.
    pub fn flush_at(&mut self, at: DateTime<Local>, command: Option<&str>) -> Option<Record> {
        if self.buffer.is_empty() {
            return None;
        }

        if let Some(reason) = discard_reason(&self.buffer) {
            debug!(%reason, bytes = self.buffer.len(), ?command, "record discarded");
            self.buffer.clear();
            return None;
        }

        let record = Record::from_bytes(&self.buffer, at, command.map(str::to_string));
        self.buffer.clear();
        Some(record)
    }
}
