use std::collections::HashMap;
use std::ffi::CStr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::fd::FdChannel;
use crate::termios::make_raw;
use crate::traits::{EndpointProvisioner, ProvisionedEndpoint};

/// Default prefix for endpoint names.
pub const DEFAULT_PREFIX: &str = "/dev/ttyS0fake";

/// Provisions virtual endpoints as pseudo-terminals.
///
/// Each endpoint is a raw pseudo-terminal pair. The multiplexer gets the
/// master side; clients open `prefix + index`, a symlink to the slave
/// device. The slave is also held open here for the endpoint's lifetime so
/// the master never sees a hang-up while no client is attached.
pub struct PtyProvisioner {
    prefix: String,
    active: HashMap<String, PtySlave>,
}

struct PtySlave {
    _fd: OwnedFd,
    device: PathBuf,
    link: PathBuf,
}

impl PtyProvisioner {
    /// Create a provisioner naming endpoints `prefix0`, `prefix1`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            active: HashMap::new(),
        }
    }

    /// Name prefix for provisioned endpoints.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Public name endpoint `index` gets.
    pub fn name_for(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    /// Number of endpoints currently provisioned.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Pseudo-terminal device behind a provisioned endpoint name.
    pub fn device_of(&self, name: &str) -> Option<&Path> {
        self.active.get(name).map(|slave| slave.device.as_path())
    }
}

impl EndpointProvisioner for PtyProvisioner {
    type Channel = FdChannel;

    fn provision(&mut self, index: usize) -> Result<ProvisionedEndpoint<FdChannel>> {
        let provision_err = |source| TransportError::Provision { index, source };

        let (master, slave) = open_pty().map_err(provision_err)?;
        make_raw(master.as_raw_fd(), None)
            .and_then(|()| make_raw(slave.as_raw_fd(), None))
            .map_err(provision_err)?;

        let device = tty_name(&slave).map_err(provision_err)?;
        debug!(index, ?device, "allocated pseudo-terminal");

        let name = self.name_for(index);
        let link = PathBuf::from(&name);
        remove_stale_link(&link)?;
        std::os::unix::fs::symlink(&device, &link).map_err(|source| TransportError::Link {
            path: link.clone(),
            source,
        })?;

        info!(index, endpoint = %name, ?device, "created endpoint");
        self.active.insert(
            name.clone(),
            PtySlave {
                _fd: slave,
                device,
                link,
            },
        );

        Ok(ProvisionedEndpoint {
            index,
            name,
            channel: FdChannel::from_owned_fd(master),
        })
    }

    fn deprovision(&mut self, name: &str) -> Result<()> {
        let slave = self
            .active
            .remove(name)
            .ok_or_else(|| TransportError::NotProvisioned(name.to_string()))?;
        let link = slave.link.clone();
        drop(slave);

        remove_link(&link)?;
        info!(endpoint = %name, "endpoint removed");
        Ok(())
    }
}

impl Drop for PtyProvisioner {
    fn drop(&mut self) {
        for (name, slave) in self.active.drain() {
            debug!(endpoint = %name, "removing endpoint left provisioned");
            let _ = remove_link(&slave.link);
        }
    }
}

fn open_pty() -> std::io::Result<(OwnedFd, OwnedFd)> {
    let mut master: libc::c_int = -1;
    let mut slave: libc::c_int = -1;

    // SAFETY: both out-pointers are valid; name, termios and winsize are
    // optional and passed as null.
    let rc = unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: openpty succeeded, so both descriptors are open and owned by us.
    Ok(unsafe { (OwnedFd::from_raw_fd(master), OwnedFd::from_raw_fd(slave)) })
}

fn tty_name(fd: &OwnedFd) -> std::io::Result<PathBuf> {
    let mut buf = [0 as libc::c_char; 256];

    // SAFETY: `buf` is writable for `buf.len()` bytes and `fd` is open.
    let rc = unsafe { libc::ttyname_r(fd.as_raw_fd(), buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(std::io::Error::from_raw_os_error(rc));
    }

    // SAFETY: ttyname_r wrote a NUL-terminated string into `buf`.
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

/// Remove a symlink left behind by an earlier run. Anything that is not a
/// symlink is left alone and reported.
fn remove_stale_link(link: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(link) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Link {
                path: link.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.file_type().is_symlink() {
        return Err(TransportError::Link {
            path: link.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a symlink",
            ),
        });
    }

    warn!(?link, "removing old symlink");
    std::fs::remove_file(link).map_err(|source| TransportError::Link {
        path: link.to_path_buf(),
        source,
    })
}

fn remove_link(link: &Path) -> Result<()> {
    match std::fs::symlink_metadata(link) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            std::fs::remove_file(link).map_err(|source| TransportError::Link {
                path: link.to_path_buf(),
                source,
            })
        }
        Ok(_) => {
            debug!(?link, "endpoint path replaced; skipping removal");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TransportError::Link {
            path: link.to_path_buf(),
            source,
        }),
    }
}
