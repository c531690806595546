use std::io::Write;

use fakebus_frame::{Frame, FrameWriter};
use tracing::{trace, warn};

use crate::config::FailurePolicy;
use crate::endpoint::Liveness;
use crate::error::{MuxError, Result};

/// Broadcasts frames from the physical line to every endpoint.
///
/// Endpoints are written in their fixed order, one complete frame each,
/// with no coalescing or filtering.
pub struct FanOut<W> {
    targets: Vec<Target<W>>,
    liveness: Liveness,
    policy: FailurePolicy,
}

struct Target<W> {
    index: usize,
    name: String,
    writer: FrameWriter<W>,
}

impl<W: Write> FanOut<W> {
    /// Build a fan-out over `(index, name, sink)` triples.
    pub fn new(
        targets: impl IntoIterator<Item = (usize, String, W)>,
        liveness: Liveness,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            targets: targets
                .into_iter()
                .map(|(index, name, sink)| Target {
                    index,
                    name,
                    writer: FrameWriter::new(sink),
                })
                .collect(),
            liveness,
            policy,
        }
    }

    /// Write `frame` to every live endpoint. Returns how many writes were
    /// issued successfully.
    ///
    /// Under [`FailurePolicy::FailFast`] the first failed write is returned
    /// as an error and later endpoints are not written. Under
    /// [`FailurePolicy::Isolate`] the failed endpoint is marked dead and the
    /// broadcast continues.
    pub fn broadcast(&mut self, frame: &Frame) -> Result<usize> {
        let mut written = 0usize;
        for target in &mut self.targets {
            if !self.liveness.is_alive(target.index) {
                continue;
            }
            match target.writer.write_frame(frame) {
                Ok(()) => written += 1,
                Err(source) => match self.policy {
                    FailurePolicy::FailFast => {
                        return Err(MuxError::EndpointWrite {
                            index: target.index,
                            name: target.name.clone(),
                            source,
                        })
                    }
                    FailurePolicy::Isolate => {
                        if self.liveness.mark_dead(target.index) {
                            warn!(
                                endpoint = %target.name,
                                error = %source,
                                "dropping endpoint after failed write"
                            );
                        }
                    }
                },
            }
        }

        trace!(
            size = frame.wire_size(),
            kind = frame.label(),
            endpoints = written,
            "wrote frame to endpoints"
        );
        Ok(written)
    }

    /// Number of endpoints this fan-out was built with.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
