//! Non-blocking descriptor sources: the data stream and the control channel.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::error::{CaptureError, Result};

/// Put a descriptor into non-blocking mode.
pub fn set_nonblocking<F: AsRawFd>(fd: &F) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: fcntl on a descriptor owned by the caller; no memory is passed.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

/// Result of one read attempt on the data stream.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome<'a> {
    /// Bytes read in this attempt.
    Chunk(&'a [u8]),
    /// Nothing available right now.
    WouldBlock,
    /// The writer side is gone.
    Eof,
}

/// Raw output of the wrapped process.
pub struct DataStream {
    file: File,
    chunk: Vec<u8>,
}

impl DataStream {
    /// Wrap a descriptor, switching it to non-blocking reads.
    pub fn new(file: File, chunk_size: usize) -> io::Result<Self> {
        set_nonblocking(&file)?;
        Ok(Self {
            file,
            chunk: vec![0u8; chunk_size.max(1)],
        })
    }

    /// Duplicate this process's stdin as the data stream.
    pub fn stdin(chunk_size: usize) -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Self::new(File::from(fd), chunk_size)
    }

    /// Read up to one chunk.
    ///
    /// Would-block and interrupted reads are reported as `WouldBlock`.
    /// Any other error is returned for the caller to treat as end of input.
    pub fn read_chunk(&mut self) -> io::Result<ReadOutcome<'_>> {
        match self.file.read(&mut self.chunk) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => {
                trace!(bytes = n, "data chunk");
                Ok(ReadOutcome::Chunk(&self.chunk[..n]))
            }
            Err(e) if is_transient(&e) => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }
}

impl AsRawFd for DataStream {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Lines drained from the control channel in one read.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ControlRead {
    /// Complete lines, newline removed, in arrival order.
    pub lines: Vec<String>,
    /// The channel reached end of input.
    pub eof: bool,
}

/// Line-oriented reader over the control channel.
///
/// Bytes are read until the descriptor would block; complete lines are
/// returned and a trailing partial line is held for the next read. At end
/// of input the partial line is returned as a final line.
pub struct ControlChannel {
    file: File,
    path: Option<PathBuf>,
    partial: Vec<u8>,
}

impl ControlChannel {
    /// Open a named pipe for reading.
    ///
    /// Opening a FIFO blocks until a writer connects; reads are non-blocking
    /// afterwards.
    pub fn open(path: &Path) -> Result<Self> {
        let to_err = |source: io::Error| CaptureError::ControlChannel {
            path: path.to_path_buf(),
            source,
        };
        debug!(path = %path.display(), "opening control channel");
        let file = File::open(path).map_err(to_err)?;
        Self::with_path(file, path)
    }

    /// Open a named pipe for reading, giving up once `cancel` is set.
    ///
    /// The blocking open is retried on `EINTR` until the flag is raised, so
    /// a signal handler installed without `SA_RESTART` can end the wait.
    /// Returns `Ok(None)` when cancelled before a writer connected.
    pub fn open_cancellable(path: &Path, cancel: &AtomicBool) -> Result<Option<Self>> {
        let to_err = |source: io::Error| CaptureError::ControlChannel {
            path: path.to_path_buf(),
            source,
        };
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| to_err(io::Error::new(ErrorKind::InvalidInput, e)))?;

        debug!(path = %path.display(), "opening control channel");
        loop {
            if cancel.load(Ordering::SeqCst) {
                debug!(path = %path.display(), "control channel open cancelled");
                return Ok(None);
            }
            // SAFETY: c_path is NUL-terminated and outlives the call
            let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
            if fd >= 0 {
                // SAFETY: open returned a fresh descriptor owned by nobody else
                let file = File::from(unsafe { OwnedFd::from_raw_fd(fd) });
                return Self::with_path(file, path).map(Some);
            }
            let err = io::Error::last_os_error();
            if err.kind() != ErrorKind::Interrupted {
                return Err(to_err(err));
            }
            trace!("control channel open interrupted");
        }
    }

    fn with_path(file: File, path: &Path) -> Result<Self> {
        set_nonblocking(&file).map_err(|source| CaptureError::ControlChannel {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
            partial: Vec::new(),
        })
    }

    /// Use an already-open descriptor as the control channel.
    pub fn from_file(file: File) -> io::Result<Self> {
        set_nonblocking(&file)?;
        Ok(Self {
            file,
            path: None,
            partial: Vec::new(),
        })
    }

    /// Path the channel was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Drain whatever is readable now.
    ///
    /// Errors other than would-block are returned for the caller to treat
    /// as end of input.
    pub fn read_lines(&mut self) -> io::Result<ControlRead> {
        let mut buf = [0u8; 512];
        let mut out = ControlRead::default();

        loop {
            match self.file.read(&mut buf) {
                Ok(0) => {
                    out.eof = true;
                    break;
                }
                Ok(n) => self.partial.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            out.lines
                .push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }

        if out.eof && !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            out.lines.push(String::from_utf8_lossy(&rest).into_owned());
        }

        Ok(out)
    }
}

impl AsRawFd for ControlChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        debug!(path = ?self.path, "control channel released");
    }
}
