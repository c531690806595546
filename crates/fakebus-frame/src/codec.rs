use bytes::{BufMut, Bytes, BytesMut};

use crate::control::{control_name, START_OF_FRAME};
use crate::error::{FrameError, Result};

/// Data frame header: marker (1) + length (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest payload a 1-byte length can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// One atomic unit on the bus, kept as its exact wire bytes.
///
/// Wire format:
/// ```text
/// ┌────────────┐
/// │ byte != 01 │                          single-byte message
/// └────────────┘
/// ┌────────────┬─────────────┬──────────────────┐
/// │ 0x01       │ Length (1B) │ Payload          │  data frame
/// │            │             │ (Length bytes)   │
/// └────────────┴─────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    wire: Bytes,
}

/// What kind of unit a frame is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A single byte other than the start marker.
    Control(u8),
    /// A start marker, length and payload.
    Data,
}

impl Frame {
    /// Build a single-byte message.
    pub fn control(byte: u8) -> Result<Self> {
        if byte == START_OF_FRAME {
            return Err(FrameError::MarkerAsControl);
        }
        Ok(Self {
            wire: Bytes::copy_from_slice(&[byte]),
        })
    }

    /// Build a data frame around `payload`.
    pub fn data(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let mut wire = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        wire.put_u8(START_OF_FRAME);
        wire.put_u8(payload.len() as u8);
        wire.put_slice(payload);
        Ok(Self {
            wire: wire.freeze(),
        })
    }

    /// Wrap bytes already known to form exactly one frame.
    pub(crate) fn from_wire(wire: Bytes) -> Self {
        debug_assert!(!wire.is_empty());
        Self { wire }
    }

    /// The frame exactly as it appears on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Consume the frame and return its wire bytes.
    pub fn into_bytes(self) -> Bytes {
        self.wire
    }

    /// Total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.wire.len()
    }

    /// Whether this is a length-prefixed data frame.
    pub fn is_data(&self) -> bool {
        self.wire[0] == START_OF_FRAME
    }

    pub fn kind(&self) -> FrameKind {
        if self.is_data() {
            FrameKind::Data
        } else {
            FrameKind::Control(self.wire[0])
        }
    }

    /// Payload bytes of a data frame; empty for single-byte messages.
    pub fn payload(&self) -> &[u8] {
        if self.is_data() {
            &self.wire[HEADER_SIZE..]
        } else {
            &[]
        }
    }

    /// The byte a single-byte message carries.
    pub fn control_byte(&self) -> Option<u8> {
        match self.kind() {
            FrameKind::Control(byte) => Some(byte),
            FrameKind::Data => None,
        }
    }

    /// Log label for the frame's leading byte.
    pub fn label(&self) -> &'static str {
        control_name(self.wire[0])
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.wire
    }
}

/// Decode one frame from an accumulated buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    let lead = *src.first()?;
    if lead != START_OF_FRAME {
        return Some(Frame::from_wire(src.split_to(1).freeze()));
    }

    let len = *src.get(1)? as usize;
    let total = HEADER_SIZE + len;
    if src.len() < total {
        return None;
    }

    Some(Frame::from_wire(src.split_to(total).freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ACK, CAN, NAK};

    #[test]
    fn data_frame_layout() {
        let frame = Frame::data(b"ABC").unwrap();
        assert_eq!(frame.as_bytes(), &[0x01, 0x03, 0x41, 0x42, 0x43]);
        assert_eq!(frame.kind(), FrameKind::Data);
        assert_eq!(frame.payload(), b"ABC");
        assert_eq!(frame.wire_size(), HEADER_SIZE + 3);
        assert_eq!(frame.label(), "SOF");
    }

    #[test]
    fn empty_data_frame() {
        let frame = Frame::data(b"").unwrap();
        assert_eq!(frame.as_bytes(), &[0x01, 0x00]);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn control_frame_layout() {
        let frame = Frame::control(ACK).unwrap();
        assert_eq!(frame.as_bytes(), &[0x06]);
        assert_eq!(frame.control_byte(), Some(ACK));
        assert!(frame.payload().is_empty());
        assert_eq!(frame.label(), "ACK");
    }

    #[test]
    fn marker_is_not_a_control_byte() {
        assert!(matches!(
            Frame::control(START_OF_FRAME),
            Err(FrameError::MarkerAsControl)
        ));
    }

    #[test]
    fn payload_limit_is_one_length_byte() {
        assert!(Frame::data(&[0u8; MAX_PAYLOAD]).is_ok());
        assert!(matches!(
            Frame::data(&[0u8; MAX_PAYLOAD + 1]),
            Err(FrameError::PayloadTooLarge { size: 256, max: 255 })
        ));
    }

    #[test]
    fn decode_waits_for_header_and_payload() {
        let mut buf = BytesMut::new();
        assert!(decode_frame(&mut buf).is_none());

        buf.put_u8(0x01);
        assert!(decode_frame(&mut buf).is_none());

        buf.put_slice(&[0x02, 0xAA]);
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 3);

        buf.put_u8(0xBB);
        let frame = decode_frame(&mut buf).unwrap();
        assert_eq!(frame.as_bytes(), &[0x01, 0x02, 0xAA, 0xBB]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_splits_mixed_stream() {
        let mut buf = BytesMut::from(&[ACK, 0x01, 0x01, 0xCC, NAK, CAN][..]);

        let frames: Vec<Frame> = std::iter::from_fn(|| decode_frame(&mut buf)).collect();
        let wires: Vec<&[u8]> = frames.iter().map(Frame::as_bytes).collect();
        assert_eq!(
            wires,
            vec![&[ACK][..], &[0x01, 0x01, 0xCC][..], &[NAK][..], &[CAN][..]]
        );
        assert!(buf.is_empty());
    }
}
