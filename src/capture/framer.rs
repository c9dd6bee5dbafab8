//! Command-boundary state machine.

use tracing::debug;

use super::signal::ControlSignal;

/// Whether a named command record is currently open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No open record. Data is still buffered.
    #[default]
    Idle,
    /// A named command is open until the next `END`.
    Accumulating {
        /// Name given by the `START` signal.
        command: String,
    },
}

impl CaptureState {
    /// Name of the open command, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Accumulating { command } => Some(command),
        }
    }
}

/// What the buffer owner must do in response to a control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to do.
    None,
    /// Discard pending bytes and start a fresh record.
    OpenRecord(String),
    /// Flush pending bytes. A flush of an empty buffer is a no-op.
    CloseRecord,
}

/// Turns control-channel lines into buffer lifecycle effects.
#[derive(Debug, Default)]
pub struct CommandFramer {
    state: CaptureState,
}

impl CommandFramer {
    /// Create a framer in the `Idle` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current framing state.
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Name of the open command, if any.
    pub fn current_command(&self) -> Option<&str> {
        self.state.command()
    }

    /// Feed one control line.
    ///
    /// `START` always moves to `Accumulating`, even over an open record.
    /// `END` always returns to `Idle`.
    pub fn on_control_line(&mut self, line: &str) -> Effect {
        match ControlSignal::parse(line) {
            Some(ControlSignal::Start { command_name }) => {
                if let Some(previous) = self.state.command() {
                    debug!(previous, next = %command_name, "record reopened before end");
                }
                debug!(command = %command_name, "command started");
                self.state = CaptureState::Accumulating {
                    command: command_name.clone(),
                };
                Effect::OpenRecord(command_name)
            }
            Some(ControlSignal::End) => {
                debug!(command = ?self.state.command(), "command ended");
                self.state = CaptureState::Idle;
                Effect::CloseRecord
            }
            None => Effect::None,
        }
    }
}
