/// Errors that can occur while detecting or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit in a 1-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The start-of-frame marker cannot be sent as a single-byte message.
    #[error("0x01 is the start-of-frame marker, not a control byte")]
    MarkerAsControl,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended part way through a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
