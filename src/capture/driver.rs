//! The readiness-multiplexed capture loop.
//!
//! One thread, one `poll(2)` per tick with a bounded timeout so that an
//! interrupt is noticed even when no input arrives. Within a tick the
//! control channel is always serviced before the data stream, so a boundary
//! line and data that become ready together are applied boundary first.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::session::CaptureSession;
use super::sink::DualSinkWriter;
use super::source::{ControlChannel, DataStream, ReadOutcome};
use crate::config::CaptureSection;
use crate::error::{CaptureError, Result};

const CONTROL: usize = 0;
const DATA: usize = 1;

/// Lifecycle of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Multiplexing both sources.
    Running,
    /// End of input seen on a source; the final flush is pending.
    Draining,
    /// Finished. No further ticks do anything.
    Stopped,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The data stream reached end of input.
    DataEof,
    /// The control channel reached end of input.
    ControlEof,
    /// Cancelled by the operator.
    Interrupted,
}

/// Drives a [`CaptureSession`] from a data stream and a control channel.
pub struct CaptureLoop<T: Write> {
    session: CaptureSession<T>,
    data: DataStream,
    control: ControlChannel,
    poll_timeout: Duration,
    cancel: Option<&'static AtomicBool>,
    state: LoopState,
    shutdown: Option<Shutdown>,
}

impl<T: Write> CaptureLoop<T> {
    /// Create a loop over already-open sources.
    pub fn new(
        session: CaptureSession<T>,
        data: DataStream,
        control: ControlChannel,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            session,
            data,
            control,
            poll_timeout,
            cancel: None,
            state: LoopState::Running,
            shutdown: None,
        }
    }

    /// Build the session and writer from configuration.
    pub fn from_config(
        config: &CaptureSection,
        terminal: T,
        data: DataStream,
        control: ControlChannel,
    ) -> Self {
        let session = CaptureSession::new(DualSinkWriter::new(config, terminal));
        Self::new(session, data, control, config.poll_timeout())
    }

    /// Stop cleanly, without a final flush, once `flag` is set.
    pub fn with_cancel(mut self, flag: &'static AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Why the loop stopped, once it has.
    pub fn shutdown(&self) -> Option<Shutdown> {
        self.shutdown
    }

    /// The session being fed.
    pub fn session(&self) -> &CaptureSession<T> {
        &self.session
    }

    /// Consume the loop, releasing both sources.
    pub fn into_session(self) -> CaptureSession<T> {
        self.session
    }

    /// Run until end of input or cancellation.
    ///
    /// Errors returned here are fatal.
    pub fn run(&mut self) -> Result<Shutdown> {
        info!(
            timeout_ms = self.poll_timeout.as_millis() as u64,
            control = ?self.control.path(),
            "capture started"
        );
        loop {
            if let Some(reason) = self.tick()? {
                info!(?reason, records = self.session.emitted(), "capture stopped");
                return Ok(reason);
            }
        }
    }

    /// One multiplexer wait plus dispatch of whatever became ready.
    ///
    /// Returns `Some` once the loop has stopped. A timeout with nothing
    /// ready is an idle tick and returns `None`.
    pub fn tick(&mut self) -> Result<Option<Shutdown>> {
        if self.state == LoopState::Stopped {
            return Ok(self.shutdown);
        }

        if self.cancelled() {
            debug!("interrupt received");
            return Ok(Some(self.stop(Shutdown::Interrupted)));
        }

        let mut fds = [
            libc::pollfd {
                fd: self.control.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.data.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        let timeout = self.poll_timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: `fds` is a live array of `fds.len()` pollfd structs.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(CaptureError::Poll(err));
        }
        if ready == 0 {
            trace!("idle tick");
            return Ok(None);
        }

        if is_ready(&fds[CONTROL]) {
            if let Some(reason) = self.service_control()? {
                return self.drain(reason).map(Some);
            }
        }

        if is_ready(&fds[DATA]) {
            if let Some(reason) = self.service_data() {
                return self.drain(reason).map(Some);
            }
        }

        Ok(None)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn service_control(&mut self) -> Result<Option<Shutdown>> {
        let read = match self.control.read_lines() {
            Ok(read) => read,
            Err(e) => {
                warn!(error = %e, "control channel read failed, treating as end of input");
                return Ok(Some(Shutdown::ControlEof));
            }
        };

        for line in &read.lines {
            self.session.on_control_line(line)?;
        }

        if read.eof {
            debug!("control channel end of input");
            return Ok(Some(Shutdown::ControlEof));
        }
        Ok(None)
    }

    fn service_data(&mut self) -> Option<Shutdown> {
        match self.data.read_chunk() {
            Ok(ReadOutcome::Chunk(bytes)) => {
                self.session.on_data(bytes);
                None
            }
            Ok(ReadOutcome::WouldBlock) => None,
            Ok(ReadOutcome::Eof) => {
                debug!("data stream end of input");
                Some(Shutdown::DataEof)
            }
            Err(e) => {
                warn!(error = %e, "data stream read failed, treating as end of input");
                Some(Shutdown::DataEof)
            }
        }
    }

    fn drain(&mut self, reason: Shutdown) -> Result<Shutdown> {
        self.state = LoopState::Draining;
        let flushed = self.session.finish();
        let reason = self.stop(reason);
        flushed.map(|_| reason)
    }

    fn stop(&mut self, reason: Shutdown) -> Shutdown {
        self.state = LoopState::Stopped;
        self.shutdown = Some(reason);
        reason
    }
}

fn is_ready(fd: &libc::pollfd) -> bool {
    fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        data: UnixStream,
        control: UnixStream,
        capture: CaptureLoop<Vec<u8>>,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let (data_w, data_r) = UnixStream::pair().unwrap();
        let (ctl_w, ctl_r) = UnixStream::pair().unwrap();
        let config = CaptureSection {
            log_file: Some(dir.path().join("capture.log")),
            poll_timeout_ms: 20,
            ..CaptureSection::default()
        };
        let capture = CaptureLoop::from_config(
            &config,
            Vec::new(),
            DataStream::new(File::from(OwnedFd::from(data_r)), config.chunk_size).unwrap(),
            ControlChannel::from_file(File::from(OwnedFd::from(ctl_r))).unwrap(),
        );
        Harness {
            dir,
            data: data_w,
            control: ctl_w,
            capture,
        }
    }

    impl Harness {
        fn log(&self) -> String {
            std::fs::read_to_string(self.dir.path().join("capture.log")).unwrap_or_default()
        }
    }

    #[test]
    fn test_idle_tick() {
        let mut h = harness();
        assert_eq!(h.capture.tick().unwrap(), None);
        assert_eq!(h.capture.state(), LoopState::Running);
    }

    #[test]
    fn test_data_eof_flushes_once() {
        let mut h = harness();
        h.data.write_all(b"pending output\n").unwrap();
        assert_eq!(h.capture.tick().unwrap(), None);
        assert_eq!(h.capture.session().pending(), 15);

        h.data.shutdown(std::net::Shutdown::Write).unwrap();
        let reason = h.capture.run().unwrap();

        assert_eq!(reason, Shutdown::DataEof);
        assert_eq!(h.capture.state(), LoopState::Stopped);
        assert_eq!(h.capture.session().emitted(), 1);
        assert!(h.log().ends_with("]\npending output\n"));
    }

    #[test]
    fn test_control_eof_stops() {
        let mut h = harness();
        h.control.shutdown(std::net::Shutdown::Write).unwrap();

        assert_eq!(h.capture.run().unwrap(), Shutdown::ControlEof);
        assert_eq!(h.capture.shutdown(), Some(Shutdown::ControlEof));
        assert_eq!(h.capture.session().emitted(), 0);
    }

    #[test]
    fn test_control_before_data_in_same_tick() {
        let mut h = harness();
        h.control.write_all(b"__CMD_START__:echo\n").unwrap();
        h.data.write_all(b"same tick").unwrap();

        // START is applied first, so the data belongs to the new record
        h.capture.tick().unwrap();
        assert_eq!(h.capture.session().pending(), 9);
        assert_eq!(h.capture.session().state().command(), Some("echo"));
    }

    #[test]
    fn test_stopped_loop_stays_stopped() {
        let mut h = harness();
        h.data.shutdown(std::net::Shutdown::Write).unwrap();
        h.capture.run().unwrap();

        assert_eq!(h.capture.tick().unwrap(), Some(Shutdown::DataEof));
    }

    #[test]
    fn test_cancel_without_flush() {
        static CANCEL: AtomicBool = AtomicBool::new(false);

        let h = harness();
        let mut capture = h.capture.with_cancel(&CANCEL);
        let mut data = h.data;
        data.write_all(b"unfinished").unwrap();
        capture.tick().unwrap();

        CANCEL.store(true, Ordering::SeqCst);
        assert_eq!(capture.run().unwrap(), Shutdown::Interrupted);
        assert_eq!(capture.session().emitted(), 0);
        assert!(!h.dir.path().join("capture.log").exists());
    }

    #[test]
    fn test_fatal_write_error_propagates() {
        let dir = TempDir::new().unwrap();
        let (mut data_w, data_r) = UnixStream::pair().unwrap();
        let (_ctl_w, ctl_r) = UnixStream::pair().unwrap();
        let config = CaptureSection {
            log_file: Some(dir.path().join("no_such_dir").join("capture.log")),
            poll_timeout_ms: 20,
            ..CaptureSection::default()
        };
        let mut capture = CaptureLoop::from_config(
            &config,
            Vec::new(),
            DataStream::new(File::from(OwnedFd::from(data_r)), 1024).unwrap(),
            ControlChannel::from_file(File::from(OwnedFd::from(ctl_r))).unwrap(),
        );

        data_w.write_all(b"text").unwrap();
        drop(data_w);

        let err = capture.run().unwrap_err();
        assert!(matches!(err, CaptureError::LogWrite { .. }));
        assert_eq!(capture.state(), LoopState::Stopped);
    }
}
