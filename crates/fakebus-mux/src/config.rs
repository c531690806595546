use std::time::Duration;

use crate::reader::ReaderId;

/// How often the supervisor checks the shutdown flag, and how long a reader
/// blocks before it checks the flag itself.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long teardown waits for readers to stop before detaching them.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long fan-out waits for an endpoint that is not draining before the
/// write counts as failed.
pub const DEFAULT_ENDPOINT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// What a reader failure brings down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any failure shuts down the whole multiplexer.
    #[default]
    FailFast,
    /// A failed endpoint is dropped and the rest keep running. Physical
    /// line failures still shut everything down.
    Isolate,
}

impl FailurePolicy {
    /// Whether a failure of `reader` must trip the shutdown signal.
    pub fn escalates(self, reader: ReaderId) -> bool {
        match (self, reader) {
            (FailurePolicy::FailFast, _) => true,
            (FailurePolicy::Isolate, ReaderId::Physical) => true,
            (FailurePolicy::Isolate, ReaderId::Endpoint(_)) => false,
        }
    }
}

/// Multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Supervisor poll period and reader read timeout. Default: 500 ms.
    pub poll_interval: Duration,
    /// Grace period for readers to stop during teardown. Default: 2 s.
    pub shutdown_grace: Duration,
    /// Longest a single fan-out write may wait on a full endpoint.
    /// Default: 1 s.
    pub endpoint_write_timeout: Duration,
    /// Failure propagation policy. Default: fail-fast.
    pub failure_policy: FailurePolicy,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            endpoint_write_timeout: DEFAULT_ENDPOINT_WRITE_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}
