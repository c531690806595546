//! Single-byte values with a known meaning on the bus.
//!
//! Only [`START_OF_FRAME`] changes how bytes are grouped. The rest pass
//! through untouched and are named for logging only.

/// Start of a length-prefixed data frame.
pub const START_OF_FRAME: u8 = 0x01;

/// Acknowledge.
pub const ACK: u8 = 0x06;

/// Negative acknowledge.
pub const NAK: u8 = 0x15;

/// Cancel.
pub const CAN: u8 = 0x18;

/// Returns a human-readable name for the first byte of a frame.
pub fn control_name(byte: u8) -> &'static str {
    match byte {
        START_OF_FRAME => "SOF",
        ACK => "ACK",
        NAK => "NAK",
        CAN => "CAN",
        _ => "OTHER",
    }
}
