use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A duplex byte channel: the physical line or one virtual endpoint.
///
/// The multiplexer splits every channel into an independent read half and
/// write half with [`DuplexChannel::try_clone_channel`], so both directions
/// can block in different threads without sharing a lock.
///
/// A read that waits longer than the configured read timeout must fail with
/// `ErrorKind::TimedOut` or `ErrorKind::WouldBlock`. Readers use that as the
/// point where they check for shutdown. A write that cannot make progress
/// within the write timeout fails the same way.
pub trait DuplexChannel: Read + Write + Send + Sized + 'static {
    /// Open another handle on the same underlying channel.
    fn try_clone_channel(&self) -> Result<Self>;

    /// Bound how long a single `read` may block. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Bound how long a single `write` may wait for the peer to drain.
    /// `None` blocks indefinitely.
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;
}

#[cfg(unix)]
impl DuplexChannel for std::os::unix::net::UnixStream {
    fn try_clone_channel(&self) -> Result<Self> {
        Ok(self.try_clone()?)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)?;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)?;
        Ok(())
    }
}

/// A freshly provisioned virtual endpoint.
#[derive(Debug)]
pub struct ProvisionedEndpoint<C> {
    /// Position of the endpoint in the endpoint set.
    pub index: usize,
    /// Public name clients open (e.g. `/dev/ttyS0fake0`).
    pub name: String,
    /// The multiplexer's side of the endpoint.
    pub channel: C,
}

/// Creates and removes virtual endpoints.
///
/// The multiplexer never creates endpoints itself. It receives the channels
/// at startup and asks the provisioner to remove them again on teardown.
pub trait EndpointProvisioner {
    type Channel: DuplexChannel;

    /// Create endpoint `index` and return its channel and public name.
    fn provision(&mut self, index: usize) -> Result<ProvisionedEndpoint<Self::Channel>>;

    /// Remove a previously provisioned endpoint by public name.
    fn deprovision(&mut self, name: &str) -> Result<()>;
}
