use std::io::Write;
use std::sync::{Arc, Mutex};

use fakebus_frame::{Frame, FrameWriter};
use tracing::trace;

use crate::error::{MuxError, Result};

/// Serializes frames from all endpoints onto the physical line.
///
/// The line's write half sits behind one mutex. A writer holds it from the
/// first byte of a frame until the frame is flushed, so frames from
/// different endpoints are only ever adjacent, never interleaved. Cloning
/// shares the same line.
pub struct MergeWriter<W> {
    line: Arc<Mutex<FrameWriter<W>>>,
}

impl<W> Clone for MergeWriter<W> {
    fn clone(&self) -> Self {
        Self {
            line: Arc::clone(&self.line),
        }
    }
}

impl<W: Write> MergeWriter<W> {
    pub fn new(line: W) -> Self {
        Self {
            line: Arc::new(Mutex::new(FrameWriter::new(line))),
        }
    }

    /// Append one whole frame to the physical line.
    pub fn write(&self, frame: &Frame) -> Result<()> {
        let mut line = self.line.lock().map_err(|_| MuxError::LinePoisoned)?;
        line.write_frame(frame).map_err(MuxError::LineWrite)?;
        trace!(
            size = frame.wire_size(),
            kind = frame.label(),
            "wrote frame to physical line"
        );
        Ok(())
    }
}
