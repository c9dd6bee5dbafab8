//! Control-channel line protocol.

/// Prefix of a line that opens a command record.
pub const START_PREFIX: &str = "__CMD_START__:";

/// Line that closes the current command record.
pub const END_MARKER: &str = "__CMD_END__";

/// A recognized line on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// Open a record for the named command.
    Start {
        /// Free text following the first `:`; not validated.
        command_name: String,
    },
    /// Close the current record.
    End,
}

impl ControlSignal {
    /// Parse one control line.
    ///
    /// Surrounding whitespace is ignored. Lines that match neither form
    /// return `None`; they are inert, not errors.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some(name) = line.strip_prefix(START_PREFIX) {
            Some(Self::Start {
                command_name: name.to_string(),
            })
        } else if line == END_MARKER {
            Some(Self::End)
        } else {
            None
        }
    }
}
