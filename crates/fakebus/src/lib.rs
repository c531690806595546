//! Share one serial line between several virtual serial ports.
//!
//! Bytes arriving on the physical line are copied to every virtual
//! endpoint; frames written by any endpoint are merged back onto the line
//! without interleaving.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial line and pseudo-terminal endpoint channels
//! - [`frame`]: Start-of-frame detection and atomic frame writes
//! - [`mux`]: Fan-out, merge and shutdown supervision

/// Re-export transport types.
pub mod transport {
    pub use fakebus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fakebus_frame::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use fakebus_mux::*;
}
