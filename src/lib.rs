//! # lv-capture
//!
//! Capture a process's raw output stream and split it into per-command
//! records.
//!
//! The wrapped shell reports command boundaries on a separate control
//! channel (`__CMD_START__:<name>` / `__CMD_END__` lines on a named pipe).
//! Each finished record is appended in full, with a timestamp, to a log
//! file, and a preview truncated to 200 characters is written to stderr.
//! Records containing terminal control sequences (OSC-7 directory reports,
//! CSI sequences) are dropped whole so they never echo back into the
//! terminal.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lv_capture::capture::{CaptureLoop, ControlChannel, DataStream};
//! use lv_capture::config::Config;
//!
//! fn main() -> lv_capture::Result<()> {
//!     let mut config = Config::default();
//!     config.apply_env();
//!
//!     let data = DataStream::stdin(config.capture.chunk_size)?;
//!     let control = ControlChannel::open(&config.capture.control_path)?;
//!     let mut capture = CaptureLoop::from_config(&config.capture, std::io::stderr(), data, control)
//!         .with_cancel(lv_capture::interrupt::flag());
//!
//!     capture.run()?;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("lv-capture requires a Unix platform (poll(2) and named pipes)");

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;

// Re-export commonly used types
pub use capture::{CaptureLoop, CaptureSession, DualSinkWriter, Record};
pub use config::Config;
pub use error::{CaptureError, Result};
