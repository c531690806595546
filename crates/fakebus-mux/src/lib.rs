//! The multiplexing engine.
//!
//! One thread reads frames from the physical line and fans each one out to
//! every endpoint. One thread per endpoint reads frames from that endpoint
//! and merges them onto the physical line, one whole frame at a time. Any
//! reader failure trips a shared [`ShutdownSignal`]; the supervisor in
//! [`RunningMux::supervise`] then stops every reader, closes every handle
//! and deprovisions the endpoints.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod merge;
pub mod reader;
pub mod signal;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    FailurePolicy, MuxConfig, DEFAULT_ENDPOINT_WRITE_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_SHUTDOWN_GRACE,
};
pub use endpoint::{Endpoint, EndpointSet, Liveness};
pub use error::{MuxError, Result};
pub use fanout::FanOut;
pub use merge::MergeWriter;
pub use reader::{ReaderId, ReaderOutcome, ReaderReport};
pub use signal::ShutdownSignal;
pub use supervisor::{Multiplexer, RunningMux, ShutdownCause, ShutdownReport};
