use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::info;

use crate::error::{Result, TransportError};
use crate::fd::FdChannel;
use crate::termios::{flush_input, make_raw, speed_for_baud};

/// The physical serial line shared by all endpoints.
pub struct SerialLine;

impl SerialLine {
    /// Baud rate used when none is configured.
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Open `path` as a raw 8-bit serial line at `baud`.
    ///
    /// The line is opened without becoming the controlling terminal, switched
    /// to raw mode, and any stale input is discarded before it is returned.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<FdChannel> {
        let path = path.as_ref();
        let speed = speed_for_baud(baud).ok_or(TransportError::UnsupportedBaud(baud))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let fd = file.as_raw_fd();
        make_raw(fd, Some(speed))
            .and_then(|()| flush_input(fd))
            .map_err(|source| TransportError::Configure {
                path: path.to_path_buf(),
                source,
            })?;

        info!(?path, baud, "opened serial line");
        Ok(FdChannel::from_owned_fd(OwnedFd::from(file)))
    }
}
