use fakebus_frame::FrameError;
use fakebus_transport::TransportError;

use crate::reader::ReaderId;

/// Errors that can occur while running the multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reader's source failed or ended.
    #[error("{reader} read failed: {source}")]
    Read {
        reader: ReaderId,
        source: FrameError,
    },

    /// Fan-out could not write a frame to an endpoint.
    #[error("write to endpoint {index} ({name}) failed: {source}")]
    EndpointWrite {
        index: usize,
        name: String,
        source: FrameError,
    },

    /// The merge writer could not write a frame to the physical line.
    #[error("write to physical line failed: {0}")]
    LineWrite(FrameError),

    /// A reader panicked while holding the physical line's write lock.
    #[error("physical line writer poisoned")]
    LinePoisoned,

    /// The multiplexer needs at least one endpoint.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// A reader thread could not be started.
    #[error("failed to spawn {reader} thread: {source}")]
    Spawn {
        reader: ReaderId,
        source: std::io::Error,
    },

    /// An isolated endpoint's reader stopped because fan-out dropped it.
    #[error("{0} dropped after a failed write")]
    EndpointDropped(ReaderId),

    /// A reader thread panicked.
    #[error("{0} thread panicked")]
    ReaderPanicked(ReaderId),
}

pub type Result<T> = std::result::Result<T, MuxError>;
