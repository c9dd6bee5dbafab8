//! The capture pipeline.
//!
//! Data flows from the [`DataStream`] into the [`BufferAccumulator`]; lines
//! on the [`ControlChannel`] drive the [`CommandFramer`], whose effects open,
//! flush or drop the buffer. Flushed buffers pass the escape-sequence gate
//! and become [`Record`]s written by the [`DualSinkWriter`].
//!
//! # Example
//!
//! ```
//! use lv_capture::capture::{CaptureSession, DualSinkWriter};
//!
//! let dir = std::env::temp_dir().join(format!("lv-capture-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//! let log = dir.join("commands.log");
//!
//! let mut session = CaptureSession::new(DualSinkWriter::with_log_file(&log, Vec::new()));
//! session.on_control_line("__CMD_START__:echo").unwrap();
//! session.on_data(b"hello world\n");
//! session.on_control_line("__CMD_END__").unwrap();
//!
//! assert_eq!(session.emitted(), 1);
//! assert!(std::fs::read_to_string(&log).unwrap().ends_with("]\nhello world\n"));
//! # std::fs::remove_dir_all(&dir).ok();
//! ```

mod buffer;
mod driver;
mod filter;
mod framer;
mod session;
mod signal;
mod sink;
mod source;

pub use buffer::{BufferAccumulator, Record, TIMESTAMP_FORMAT};
pub use driver::{CaptureLoop, LoopState, Shutdown};
pub use filter::{discard_reason, should_discard, DiscardReason, CSI_INTRODUCER, OSC7_MARKER};
pub use framer::{CaptureState, CommandFramer, Effect};
pub use session::CaptureSession;
pub use signal::{ControlSignal, END_MARKER, START_PREFIX};
pub use sink::{truncate_preview, DualSinkWriter};
pub use source::{set_nonblocking, ControlChannel, ControlRead, DataStream, ReadOutcome};
