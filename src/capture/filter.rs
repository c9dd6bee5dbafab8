//! Escape-sequence gate for captured output.
//!
//! Shells emit OSC-7 working-directory reports and CSI sequences to keep the
//! terminal in sync. Logging them is useless, and echoing them back to a
//! terminal that reacts to them can start a feedback loop. This check must
//! stay in front of every sink write.

use std::fmt;

/// Marker of an OSC-7 "current directory" report (`ESC ] 7 ; file://...`).
pub const OSC7_MARKER: &[u8] = b"]7;file://";

/// Control Sequence Introducer: ESC followed by `[`.
pub const CSI_INTRODUCER: &[u8] = &[0x1b, b'['];

/// Why a buffer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Contains an OSC-7 working-directory report.
    Osc7,
    /// Contains a CSI introducer.
    Csi,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Osc7 => f.write_str("OSC-7 directory report"),
            Self::Csi => f.write_str("CSI sequence"),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Classify a buffer, returning the first matching reason to discard it.
///
/// Matching is containment anywhere in the buffer, not a prefix anchor.
pub fn discard_reason(buffer: &[u8]) -> Option<DiscardReason> {
    if contains(buffer, OSC7_MARKER) {
        Some(DiscardReason::Osc7)
    } else if contains(buffer, CSI_INTRODUCER) {
        Some(DiscardReason::Csi)
    } else {
        None
    }
}

/// Whether the whole buffer must be dropped instead of emitted.
pub fn should_discard(buffer: &[u8]) -> bool {
    discard_reason(buffer).is_some()
}
