use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{Frame, HEADER_SIZE};
use crate::control::START_OF_FRAME;
use crate::error::{FrameError, Result};

/// Detects complete frames on any `Read` source.
///
/// Reads exactly the bytes of one frame and nothing more: one byte for a
/// single-byte message, `2 + length` bytes for a data frame. Short reads
/// and `EINTR` are retried internally; any other failure is returned and
/// the partial frame is dropped.
pub struct FrameDetector<T> {
    inner: T,
}

impl<T: Read> FrameDetector<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the source ends
    /// between frames and `Err(FrameError::Truncated { .. })` when it ends
    /// inside one.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let mut lead = [0u8; 1];
        if self.read_full(&mut lead)? == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        if lead[0] != START_OF_FRAME {
            return Ok(Frame::from_wire(Bytes::copy_from_slice(&lead)));
        }

        let mut len = [0u8; 1];
        if self.read_full(&mut len)? == 0 {
            return Err(FrameError::Truncated {
                expected: HEADER_SIZE,
                received: 1,
            });
        }

        let payload_len = len[0] as usize;
        let total = HEADER_SIZE + payload_len;
        let mut wire = BytesMut::zeroed(total);
        wire[0] = START_OF_FRAME;
        wire[1] = len[0];

        let received = self.read_full(&mut wire[HEADER_SIZE..])?;
        if received < payload_len {
            return Err(FrameError::Truncated {
                expected: total,
                received: HEADER_SIZE + received,
            });
        }

        Ok(Frame::from_wire(wire.freeze()))
    }

    /// Fill `buf` completely. Returns fewer bytes only at end of stream.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(filled)
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the detector and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for FrameDetector<T> {
    type Item = Result<Frame>;

    /// Yields frames until the source closes cleanly between frames.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Err(FrameError::ConnectionClosed) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::control::{ACK, CAN, NAK};

    #[test]
    fn data_frame_for_every_length() {
        for len in 0..=255u8 {
            let payload: Vec<u8> = (0..len).map(|i| i.wrapping_mul(7)).collect();
            let mut wire = vec![START_OF_FRAME, len];
            wire.extend_from_slice(&payload);
            wire.push(0xEE);

            let mut detector = FrameDetector::new(Cursor::new(wire.clone()));
            let frame = detector.next_frame().unwrap();

            assert_eq!(frame.as_bytes(), &wire[..wire.len() - 1]);
            assert_eq!(frame.payload(), payload.as_slice());
            assert_eq!(detector.get_ref().position(), 2 + len as u64);
        }
    }

    #[test]
    fn single_byte_frames_do_not_look_ahead() {
        for byte in (0..=255u8).filter(|b| *b != START_OF_FRAME) {
            let mut detector = FrameDetector::new(Cursor::new(vec![byte, START_OF_FRAME, 0x05]));
            let frame = detector.next_frame().unwrap();

            assert_eq!(frame.as_bytes(), &[byte]);
            assert_eq!(detector.get_ref().position(), 1);
        }
    }

    #[test]
    fn mixed_stream_in_order() {
        let wire = vec![ACK, 0x01, 0x03, 0x41, 0x42, 0x43, NAK, 0x01, 0x00, CAN];
        let detector = FrameDetector::new(Cursor::new(wire));

        let frames: Vec<Vec<u8>> = detector
            .map(|frame| frame.unwrap().as_bytes().to_vec())
            .collect();
        assert_eq!(
            frames,
            vec![
                vec![ACK],
                vec![0x01, 0x03, 0x41, 0x42, 0x43],
                vec![NAK],
                vec![0x01, 0x00],
                vec![CAN],
            ]
        );
    }

    #[test]
    fn partial_read_handling() {
        let source = ByteByByteReader {
            bytes: vec![0x01, 0x02, 0xAA, 0xBB],
            pos: 0,
        };
        let mut detector = FrameDetector::new(source);

        let frame = detector.next_frame().unwrap();
        assert_eq!(frame.as_bytes(), &[0x01, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut detector = FrameDetector::new(Cursor::new(Vec::<u8>::new()));
        let err = detector.next_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_after_marker() {
        let mut detector = FrameDetector::new(Cursor::new(vec![0x01]));
        let err = detector.next_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 2,
                received: 1
            }
        ));
    }

    #[test]
    fn connection_closed_mid_payload() {
        let mut detector = FrameDetector::new(Cursor::new(vec![0x01, 0x04, 0x10, 0x11]));
        let err = detector.next_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 6,
                received: 4
            }
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let source = FailOnce {
            kind: ErrorKind::Interrupted,
            failed: false,
            bytes: Cursor::new(vec![0x01, 0x01, 0xCC]),
        };
        let mut detector = FrameDetector::new(source);

        let frame = detector.next_frame().unwrap();
        assert_eq!(frame.as_bytes(), &[0x01, 0x01, 0xCC]);
    }

    #[test]
    fn hard_failure_is_not_retried() {
        let source = FailOnce {
            kind: ErrorKind::BrokenPipe,
            failed: false,
            bytes: Cursor::new(vec![ACK]),
        };
        let mut detector = FrameDetector::new(source);

        let err = detector.next_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn timeout_propagates_as_io_error() {
        let source = FailOnce {
            kind: ErrorKind::TimedOut,
            failed: false,
            bytes: Cursor::new(vec![ACK]),
        };
        let mut detector = FrameDetector::new(source);

        let err = detector.next_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::TimedOut));
        assert_eq!(detector.next_frame().unwrap().as_bytes(), &[ACK]);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut detector = FrameDetector::new(Cursor::new(Vec::<u8>::new()));

        let _ = detector.get_ref();
        let _ = detector.get_mut();
        let _inner = detector.into_inner();
    }

    #[test]
    fn detects_over_socket_pair() {
        use std::io::Write;

        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut detector = FrameDetector::new(right);

        let writer = std::thread::spawn(move || {
            for chunk in [&[0x01u8][..], &[0x03, 0x41], &[0x42, 0x43, ACK]] {
                left.write_all(chunk).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        });

        assert_eq!(
            detector.next_frame().unwrap().as_bytes(),
            &[0x01, 0x03, 0x41, 0x42, 0x43]
        );
        assert_eq!(detector.next_frame().unwrap().as_bytes(), &[ACK]);
        writer.join().unwrap();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FailOnce {
        kind: ErrorKind,
        failed: bool,
        bytes: Cursor<Vec<u8>>,
    }

    impl Read for FailOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.bytes.read(buf)
        }
    }
}
