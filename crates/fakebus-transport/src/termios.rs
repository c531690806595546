//! Raw-mode terminal configuration shared by serial lines and pseudo-terminals.

use std::os::fd::RawFd;

/// Put a terminal into raw byte mode: no echo, no line discipline, no
/// translation, reads return as soon as one byte is available.
pub(crate) fn make_raw(fd: RawFd, speed: Option<libc::speed_t>) -> std::io::Result<()> {
    // SAFETY: an all-zero termios is a valid out-parameter for tcgetattr.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `tio` is a valid, writable termios and `fd` is open.
    check(unsafe { libc::tcgetattr(fd, &mut tio) })?;

    // SAFETY: `tio` was initialized by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;

    if let Some(speed) = speed {
        // SAFETY: `tio` is a valid termios owned by this frame.
        check(unsafe { libc::cfsetispeed(&mut tio, speed) })?;
        // SAFETY: as above.
        check(unsafe { libc::cfsetospeed(&mut tio, speed) })?;
    }

    // SAFETY: `tio` is a fully initialized termios and `fd` is open.
    check(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) })
}

/// Discard bytes received but not yet read.
pub(crate) fn flush_input(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: `fd` is an open terminal descriptor.
    check(unsafe { libc::tcflush(fd, libc::TCIFLUSH) })
}

/// Map a numeric baud rate to its termios speed constant.
pub(crate) fn speed_for_baud(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        500_000 => libc::B500000,
        #[cfg(target_os = "linux")]
        576_000 => libc::B576000,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        #[cfg(target_os = "linux")]
        1_500_000 => libc::B1500000,
        #[cfg(target_os = "linux")]
        2_000_000 => libc::B2000000,
        #[cfg(target_os = "linux")]
        3_000_000 => libc::B3000000,
        #[cfg(target_os = "linux")]
        4_000_000 => libc::B4000000,
        _ => return None,
    };
    Some(speed)
}

fn check(rc: libc::c_int) -> std::io::Result<()> {
    if rc == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}
