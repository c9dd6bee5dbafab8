//! Framing, buffering and emission wired together.
//!
//! `CaptureSession` holds no descriptors, so every framing rule can be
//! exercised directly with byte slices and strings.

use std::io::Write;

use tracing::trace;

use super::buffer::BufferAccumulator;
use super::framer::{CaptureState, CommandFramer, Effect};
use super::sink::DualSinkWriter;
use crate::Result;

/// The pure capture state machine fed by the loop.
pub struct CaptureSession<T: Write> {
    framer: CommandFramer,
    buffer: BufferAccumulator,
    writer: DualSinkWriter<T>,
    emitted: u64,
}

impl<T: Write> CaptureSession<T> {
    /// Create an idle session with an empty buffer.
    pub fn new(writer: DualSinkWriter<T>) -> Self {
        Self {
            framer: CommandFramer::new(),
            buffer: BufferAccumulator::new(),
            writer,
            emitted: 0,
        }
    }

    /// Bytes from the data stream. Buffered regardless of framing state.
    pub fn on_data(&mut self, chunk: &[u8]) {
        self.buffer.append(chunk);
    }

    /// One line from the control channel.
    pub fn on_control_line(&mut self, line: &str) -> Result<()> {
        trace!(line = line.trim_end(), "control line");
        let closing = self.framer.current_command().map(str::to_string);
        match self.framer.on_control_line(line) {
            Effect::None => Ok(()),
            Effect::OpenRecord(_) => {
                self.buffer.clear();
                Ok(())
            }
            Effect::CloseRecord => self.flush_as(closing.as_deref()),
        }
    }

    /// End of input: flush whatever is pending, open record or not.
    pub fn finish(&mut self) -> Result<()> {
        self.flush()
    }

    /// Flush the buffer through the filter to both sinks.
    ///
    /// No-op when the buffer is empty.
    pub fn flush(&mut self) -> Result<()> {
        let command = self.framer.current_command().map(str::to_string);
        self.flush_as(command.as_deref())
    }

    fn flush_as(&mut self, command: Option<&str>) -> Result<()> {
        if let Some(record) = self.buffer.flush(command) {
            self.writer.emit(&record)?;
            self.emitted += 1;
        }
        Ok(())
    }

    /// Current framing state.
    pub fn state(&self) -> &CaptureState {
        self.framer.state()
    }

    /// Number of bytes awaiting a flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Records written to both sinks so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// The sink writer.
    pub fn writer(&self) -> &DualSinkWriter<T> {
        &self.writer
    }

    /// Consume the session, returning the sink writer.
    pub fn into_writer(self) -> DualSinkWriter<T> {
        self.writer
    }
}
