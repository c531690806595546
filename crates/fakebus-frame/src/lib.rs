//! Frame detection for serial buses that mix single-byte control messages
//! with length-prefixed data frames.
//!
//! Every unit on the wire is one of:
//! - a single byte that is not `0x01` (ACK, NAK, CAN, ...), or
//! - `0x01`, a 1-byte length, then that many payload bytes.
//!
//! The detector never looks ahead and never hands out part of a frame.

pub mod codec;
pub mod control;
pub mod detector;
pub mod error;
pub mod writer;

pub use codec::{decode_frame, Frame, FrameKind, HEADER_SIZE, MAX_PAYLOAD};
pub use control::{control_name, ACK, CAN, NAK, START_OF_FRAME};
pub use detector::FrameDetector;
pub use error::{FrameError, Result};
pub use writer::FrameWriter;
