use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::traits::DuplexChannel;

/// A duplex channel backed by an owned file descriptor.
///
/// Used for both the physical serial line and the multiplexer side of each
/// pseudo-terminal endpoint. The descriptor is closed when the channel is
/// dropped; every clone owns its own descriptor.
///
/// Every read and write first waits in `poll(2)`, so the descriptor may be
/// non-blocking without callers ever seeing `WouldBlock`.
pub struct FdChannel {
    file: File,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl FdChannel {
    /// Take ownership of an open descriptor.
    pub fn from_owned_fd(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Current write timeout.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }
}

impl Read for FdChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if !wait_for(self.file.as_raw_fd(), libc::POLLIN, self.read_timeout)? {
                return Err(std::io::Error::new(
                    ErrorKind::TimedOut,
                    "no data before read timeout",
                ));
            }
            match self.file.read(buf) {
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }
}

impl Write for FdChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let deadline = self.write_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if !wait_for(self.file.as_raw_fd(), libc::POLLOUT, remaining)? {
                return Err(std::io::Error::new(
                    ErrorKind::TimedOut,
                    "peer did not drain before write timeout",
                ));
            }
            match self.file.write(buf) {
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl DuplexChannel for FdChannel {
    fn try_clone_channel(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    /// A bounded write needs a non-blocking descriptor: `poll` only promises
    /// room for some bytes, and a blocking tty write would wait for the rest.
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        if timeout.is_some() {
            set_nonblocking(self.file.as_raw_fd())?;
        }
        self.write_timeout = timeout;
        Ok(())
    }
}

impl AsFd for FdChannel {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for FdChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for FdChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdChannel")
            .field("fd", &self.file.as_raw_fd())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

/// `poll(2)` timeout for `timeout`, rounded up to whole milliseconds so a
/// short non-zero timeout still sleeps. `None` waits forever.
fn poll_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(timeout) => {
            let millis = timeout.as_nanos().div_ceil(1_000_000);
            millis.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

/// Wait until `fd` is ready for `events`, hung up or in error, or `timeout`
/// elapses.
///
/// Returns `Ok(false)` on timeout. Hang-up and error conditions report
/// ready so the following `read` or `write` surfaces them.
fn wait_for(fd: RawFd, events: libc::c_short, timeout: Option<Duration>) -> std::io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let millis = poll_millis(timeout);

    loop {
        // SAFETY: `pollfd` is a valid, writable pollfd and the count is 1.
        let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
        match rc {
            -1 => {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            0 => return Ok(false),
            _ => return Ok(true),
        }
    }
}

fn set_nonblocking(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: F_GETFL/F_SETFL on an open descriptor take no pointers.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(std::io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
