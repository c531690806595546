use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use fakebus_frame::{Frame, FrameDetector, FrameError};
use tracing::{debug, trace, warn};

use crate::config::FailurePolicy;
use crate::endpoint::Liveness;
use crate::error::{MuxError, Result};
use crate::signal::ShutdownSignal;

/// Identifies one reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderId {
    /// Reads the physical line and fans out to endpoints.
    Physical,
    /// Reads endpoint `n` and merges onto the physical line.
    Endpoint(usize),
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderId::Physical => write!(f, "physical line"),
            ReaderId::Endpoint(index) => write!(f, "endpoint {index}"),
        }
    }
}

/// How a reader stopped.
#[derive(Debug)]
pub enum ReaderOutcome {
    /// The shutdown signal was observed.
    Cancelled,
    /// The source or the forwarding sink failed.
    Failed(MuxError),
}

impl ReaderOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReaderOutcome::Failed(_))
    }
}

/// What a reader hands the supervisor when it stops.
#[derive(Debug)]
pub struct ReaderReport {
    pub reader: ReaderId,
    pub outcome: ReaderOutcome,
    /// Frames forwarded before stopping.
    pub frames: u64,
    /// This reader's failure is what set the shutdown signal.
    pub tripped_shutdown: bool,
}

/// Marker carried inside the `io::Error` a cancelled read returns.
#[derive(Debug, thiserror::Error)]
#[error("read cancelled by shutdown")]
struct ReadCancelled;

/// Marker carried inside the `io::Error` a dropped endpoint's read returns.
#[derive(Debug, thiserror::Error)]
#[error("endpoint dropped")]
struct EndpointDropped;

/// A source whose read timeouts become shutdown checkpoints.
///
/// Timed-out reads are retried until data arrives, the signal is set, or
/// the watched endpoint is marked dead. A set signal fails the next read
/// with [`ReadCancelled`]; a dead endpoint fails it with
/// [`EndpointDropped`].
pub(crate) struct Interruptible<R> {
    inner: R,
    signal: ShutdownSignal,
    watch: Option<(Liveness, usize)>,
}

impl<R> Interruptible<R> {
    pub(crate) fn new(inner: R, signal: ShutdownSignal) -> Self {
        Self {
            inner,
            signal,
            watch: None,
        }
    }

    /// Also stop once endpoint `index` is marked dead in `liveness`.
    pub(crate) fn watching(mut self, liveness: Liveness, index: usize) -> Self {
        self.watch = Some((liveness, index));
        self
    }

    fn dropped(&self) -> bool {
        self.watch
            .as_ref()
            .is_some_and(|(liveness, index)| !liveness.is_alive(*index))
    }
}

impl<R: Read> Read for Interruptible<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.signal.is_triggered() {
                return Err(std::io::Error::other(ReadCancelled));
            }
            if self.dropped() {
                return Err(std::io::Error::other(EndpointDropped));
            }
            match self.inner.read(buf) {
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue
                }
                other => return other,
            }
        }
    }
}

fn carries<M: std::error::Error + 'static>(err: &FrameError) -> bool {
    match err {
        FrameError::Io(io) => io.get_ref().is_some_and(|inner| inner.is::<M>()),
        _ => false,
    }
}

/// Detect frames on `source` and hand each one to `forward` until the
/// signal is set or something fails.
///
/// With `liveness`, an endpoint reader also stops as soon as its endpoint
/// is marked dead, so a dropped endpoint no longer reaches the line.
pub(crate) fn run_reader<R, F>(
    reader: ReaderId,
    source: R,
    signal: &ShutdownSignal,
    liveness: Option<&Liveness>,
    mut forward: F,
) -> ReaderReport
where
    R: Read,
    F: FnMut(&Frame) -> Result<()>,
{
    let mut source = Interruptible::new(source, signal.clone());
    let watched = match (reader, liveness) {
        (ReaderId::Endpoint(index), Some(liveness)) => {
            source = source.watching(liveness.clone(), index);
            Some((liveness, index))
        }
        _ => None,
    };
    let mut detector = FrameDetector::new(source);
    let mut frames = 0u64;

    let outcome = loop {
        let frame = match detector.next_frame() {
            Ok(frame) => frame,
            Err(err) if carries::<ReadCancelled>(&err) => break ReaderOutcome::Cancelled,
            Err(err) if carries::<EndpointDropped>(&err) => {
                break ReaderOutcome::Failed(MuxError::EndpointDropped(reader))
            }
            Err(source) => break ReaderOutcome::Failed(MuxError::Read { reader, source }),
        };
        if let Some((liveness, index)) = watched {
            if !liveness.is_alive(index) {
                break ReaderOutcome::Failed(MuxError::EndpointDropped(reader));
            }
        }

        trace!(
            %reader,
            size = frame.wire_size(),
            kind = frame.label(),
            "read frame"
        );
        if let Err(err) = forward(&frame) {
            break ReaderOutcome::Failed(err);
        }
        frames += 1;
    };

    ReaderReport {
        reader,
        outcome,
        frames,
        tripped_shutdown: false,
    }
}

/// Everything a reader thread needs besides its source and sink.
pub(crate) struct ReaderContext {
    pub(crate) signal: ShutdownSignal,
    pub(crate) policy: FailurePolicy,
    pub(crate) liveness: Liveness,
    pub(crate) reports: Sender<ReaderReport>,
}

/// Start a reader thread.
///
/// On failure the thread applies the failure policy before reporting: it
/// trips the shutdown signal, or under isolation marks its endpoint dead.
pub(crate) fn spawn_reader<R, F>(
    reader: ReaderId,
    source: R,
    forward: F,
    ctx: ReaderContext,
) -> Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    F: FnMut(&Frame) -> Result<()> + Send + 'static,
{
    let name = match reader {
        ReaderId::Physical => "fakebus-physical".to_string(),
        ReaderId::Endpoint(index) => format!("fakebus-endpoint-{index}"),
    };

    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            debug!(%reader, "reader started");
            let mut report =
                run_reader(reader, source, &ctx.signal, Some(&ctx.liveness), forward);

            match &report.outcome {
                ReaderOutcome::Cancelled => {
                    debug!(%reader, frames = report.frames, "reader stopped")
                }
                ReaderOutcome::Failed(err) => {
                    warn!(%reader, error = %err, "stopped reading");
                    if ctx.policy.escalates(reader) {
                        report.tripped_shutdown = ctx.signal.trigger();
                    } else if let ReaderId::Endpoint(index) = reader {
                        ctx.liveness.mark_dead(index);
                    }
                }
            }

            let _ = ctx.reports.send(report);
        })
        .map_err(|source| MuxError::Spawn { reader, source })
}
