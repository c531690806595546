//! Duplex byte channels for fakebus.
//!
//! This is the lowest layer of fakebus. It knows how to open the physical
//! serial line and how to provision virtual endpoints, and hands both out as
//! [`DuplexChannel`] handles. Nothing here understands framing.
//!
//! - [`SerialLine`] opens and configures the real device.
//! - [`PtyProvisioner`] creates pseudo-terminal endpoints with stable names.

pub mod error;
pub mod fd;
pub mod pty;
pub mod serial;
mod termios;
pub mod traits;

pub use error::{Result, TransportError};
pub use fd::FdChannel;
pub use pty::PtyProvisioner;
pub use serial::SerialLine;
pub use traits::{DuplexChannel, EndpointProvisioner, ProvisionedEndpoint};
