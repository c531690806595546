use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use fakebus_transport::{DuplexChannel, EndpointProvisioner, TransportError};
use tracing::{debug, info, warn};

use crate::config::MuxConfig;
use crate::endpoint::{EndpointSet, Liveness};
use crate::error::{MuxError, Result};
use crate::fanout::FanOut;
use crate::merge::MergeWriter;
use crate::reader::{spawn_reader, ReaderContext, ReaderId, ReaderOutcome, ReaderReport};
use crate::signal::ShutdownSignal;

/// A multiplexer that has its channels but has not started reading yet.
pub struct Multiplexer<C> {
    line: C,
    endpoints: EndpointSet<C>,
    config: MuxConfig,
    signal: ShutdownSignal,
}

impl<C: DuplexChannel> Multiplexer<C> {
    /// Pair the physical line with the endpoint set.
    pub fn new(line: C, endpoints: EndpointSet<C>, config: MuxConfig) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(MuxError::NoEndpoints);
        }
        Ok(Self {
            line,
            endpoints,
            config,
            signal: ShutdownSignal::new(),
        })
    }

    /// The signal that stops this multiplexer. Setting it from outside
    /// (e.g. a Ctrl-C handler) requests an orderly shutdown.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Split every channel and start one reader thread per source.
    ///
    /// Each channel's read half gets the poll interval as its read timeout
    /// so readers notice shutdown within one interval. Each endpoint's
    /// fan-out half gets the endpoint write timeout, so an endpoint whose
    /// client stops reading fails its write instead of stalling the bus.
    pub fn start(self) -> Result<RunningMux> {
        let Self {
            line,
            endpoints,
            config,
            signal,
        } = self;
        let poll = Some(config.poll_interval);
        let names = endpoints.names();
        let liveness = Liveness::new(endpoints.len());
        let (reports_tx, reports) = mpsc::channel();

        let mut line_reader = line.try_clone_channel()?;
        line_reader.set_read_timeout(poll)?;
        let merge = MergeWriter::new(line);

        let mut endpoint_readers = Vec::with_capacity(endpoints.len());
        let mut fanout_targets = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints.into_inner() {
            let (index, name, mut channel) = endpoint.into_parts();
            let mut reader = channel.try_clone_channel()?;
            reader.set_read_timeout(poll)?;
            channel.set_write_timeout(Some(config.endpoint_write_timeout))?;
            endpoint_readers.push((index, reader));
            fanout_targets.push((index, name, channel));
        }
        let mut fanout = FanOut::new(fanout_targets, liveness.clone(), config.failure_policy);

        let context = || ReaderContext {
            signal: signal.clone(),
            policy: config.failure_policy,
            liveness: liveness.clone(),
            reports: reports_tx.clone(),
        };

        let mut handles = HashMap::new();
        let spawn_all = || -> Result<()> {
            let handle = spawn_reader(
                ReaderId::Physical,
                line_reader,
                move |frame| fanout.broadcast(frame).map(|_| ()),
                context(),
            )?;
            handles.insert(ReaderId::Physical, handle);

            for (index, reader) in endpoint_readers {
                let merge = merge.clone();
                let id = ReaderId::Endpoint(index);
                let handle = spawn_reader(id, reader, move |frame| merge.write(frame), context())?;
                handles.insert(id, handle);
            }
            Ok(())
        };
        if let Err(err) = spawn_all() {
            signal.trigger();
            return Err(err);
        }

        info!(
            endpoints = names.len(),
            poll_interval = ?config.poll_interval,
            endpoint_write_timeout = ?config.endpoint_write_timeout,
            policy = ?config.failure_policy,
            "multiplexer running"
        );

        Ok(RunningMux {
            signal,
            config,
            liveness,
            names,
            reports,
            handles,
            started: Instant::now(),
        })
    }
}

/// A started multiplexer, owned by the supervising thread.
pub struct RunningMux {
    signal: ShutdownSignal,
    config: MuxConfig,
    liveness: Liveness,
    names: Vec<String>,
    reports: Receiver<ReaderReport>,
    handles: HashMap<ReaderId, JoinHandle<()>>,
    started: Instant,
}

/// Why the multiplexer shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A reader failed and the failure policy escalated it.
    ReaderFailed(ReaderId),
    /// Every endpoint was dropped under the isolating policy.
    NoLiveEndpoints,
    /// The shutdown signal was set from outside.
    Requested,
}

/// Summary of a completed shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    /// Reader outcomes in the order the supervisor received them.
    pub readers: Vec<ReaderReport>,
    /// Readers that had not stopped when the grace period ran out.
    pub detached: Vec<ReaderId>,
    /// Endpoint names successfully deprovisioned.
    pub deprovisioned: Vec<String>,
    /// Endpoint names that could not be deprovisioned.
    pub deprovision_failures: Vec<(String, TransportError)>,
    pub uptime: Duration,
}

impl ShutdownReport {
    /// Reports of readers that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ReaderReport> {
        self.readers.iter().filter(|r| r.outcome.is_failure())
    }

    /// Frames a reader forwarded, if it reported.
    pub fn frames_forwarded(&self, reader: ReaderId) -> Option<u64> {
        self.readers
            .iter()
            .find(|r| r.reader == reader)
            .map(|r| r.frames)
    }
}

impl RunningMux {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Public names of the endpoints being served.
    pub fn endpoint_names(&self) -> &[String] {
        &self.names
    }

    /// Block until shutdown, then tear everything down.
    ///
    /// Polls the shutdown signal every poll interval while collecting
    /// reader outcomes. Once the signal is set, waits up to the grace
    /// period for every reader to stop, which closes all channel handles,
    /// then deprovisions every endpoint through `provisioner`.
    pub fn supervise<P: EndpointProvisioner>(mut self, provisioner: &mut P) -> ShutdownReport {
        let mut readers = Vec::new();
        let mut no_live_endpoints = false;

        while !self.signal.is_triggered() {
            match self.reports.recv_timeout(self.config.poll_interval) {
                Ok(report) => self.record(report, &mut readers),
                Err(RecvTimeoutError::Timeout) => self.reap_panicked(&mut readers),
                Err(RecvTimeoutError::Disconnected) => {
                    self.signal.trigger();
                }
            }

            if self.liveness.live_count() == 0 && self.signal.trigger() {
                warn!("no live endpoints remain");
                no_live_endpoints = true;
            }
        }

        info!("shutting down");
        let detached = self.stop_readers(&mut readers);
        let cause = shutdown_cause(&readers, no_live_endpoints);

        info!("removing endpoints");
        let mut deprovisioned = Vec::new();
        let mut deprovision_failures = Vec::new();
        for name in self.names.drain(..) {
            match provisioner.deprovision(&name) {
                Ok(()) => deprovisioned.push(name),
                Err(err) => {
                    warn!(endpoint = %name, error = %err, "failed to remove endpoint");
                    deprovision_failures.push((name, err));
                }
            }
        }

        ShutdownReport {
            cause,
            readers,
            detached,
            deprovisioned,
            deprovision_failures,
            uptime: self.started.elapsed(),
        }
    }

    fn record(&mut self, report: ReaderReport, readers: &mut Vec<ReaderReport>) {
        if let Some(handle) = self.handles.remove(&report.reader) {
            if handle.join().is_err() {
                warn!(reader = %report.reader, "reader thread panicked after reporting");
            }
        }
        readers.push(report);
    }

    /// Turn threads that died without reporting into failure reports.
    fn reap_panicked(&mut self, readers: &mut Vec<ReaderReport>) {
        let finished: Vec<ReaderId> = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        if finished.is_empty() {
            return;
        }

        // A finished thread may have reported after the last receive.
        while let Ok(report) = self.reports.try_recv() {
            self.record(report, readers);
        }

        for reader in finished {
            let Some(handle) = self.handles.remove(&reader) else {
                continue;
            };
            let _ = handle.join();
            warn!(%reader, "reader thread died without reporting");
            let mut tripped_shutdown = false;
            if self.config.failure_policy.escalates(reader) {
                tripped_shutdown = self.signal.trigger();
            } else if let ReaderId::Endpoint(index) = reader {
                self.liveness.mark_dead(index);
            }
            readers.push(ReaderReport {
                reader,
                outcome: ReaderOutcome::Failed(MuxError::ReaderPanicked(reader)),
                frames: 0,
                tripped_shutdown,
            });
        }
    }

    /// Every reader has dropped its report sender, so the remaining threads
    /// are exiting without a report.
    fn reap_exited(&mut self, readers: &mut Vec<ReaderReport>) {
        for (reader, handle) in self.handles.drain() {
            let _ = handle.join();
            warn!(%reader, "reader thread died without reporting");
            readers.push(ReaderReport {
                reader,
                outcome: ReaderOutcome::Failed(MuxError::ReaderPanicked(reader)),
                frames: 0,
                tripped_shutdown: false,
            });
        }
    }

    /// Wait for every reader to stop, up to the grace period. Returns the
    /// readers left running.
    fn stop_readers(&mut self, readers: &mut Vec<ReaderReport>) -> Vec<ReaderId> {
        let deadline = Instant::now() + self.config.shutdown_grace;
        while !self.handles.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.reports.recv_timeout(remaining.min(self.config.poll_interval)) {
                Ok(report) => self.record(report, readers),
                Err(RecvTimeoutError::Timeout) => self.reap_panicked(readers),
                Err(RecvTimeoutError::Disconnected) => {
                    self.reap_exited(readers);
                    break;
                }
            }
        }

        let mut detached: Vec<ReaderId> = self.handles.drain().map(|(id, _)| id).collect();
        detached.sort_by_key(|id| match id {
            ReaderId::Physical => 0,
            ReaderId::Endpoint(index) => index + 1,
        });
        for reader in &detached {
            warn!(%reader, "reader did not stop within grace period; detaching");
        }
        debug!(stopped = readers.len(), detached = detached.len(), "readers stopped");
        detached
    }
}

/// Attribute the shutdown to whoever set the signal first. Readers that
/// fail while tearing down never claim it.
fn shutdown_cause(readers: &[ReaderReport], no_live_endpoints: bool) -> ShutdownCause {
    if let Some(report) = readers.iter().find(|r| r.tripped_shutdown) {
        ShutdownCause::ReaderFailed(report.reader)
    } else if no_live_endpoints {
        ShutdownCause::NoLiveEndpoints
    } else {
        ShutdownCause::Requested
    }
}

#[cfg(test)]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::os::unix::net::UnixStream;

    use fakebus_frame::{FrameDetector, ACK};

    use super::*;
    use crate::config::FailurePolicy;
    use crate::testing::RecordingProvisioner;

    struct Harness {
        running: RunningMux,
        provisioner: RecordingProvisioner,
        line: UnixStream,
        clients: Vec<UnixStream>,
    }

    fn harness(count: usize, policy: FailurePolicy) -> Harness {
        harness_with_write_timeout(count, policy, Duration::from_secs(1))
    }

    fn harness_with_write_timeout(
        count: usize,
        policy: FailurePolicy,
        endpoint_write_timeout: Duration,
    ) -> Harness {
        let config = MuxConfig {
            poll_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_secs(2),
            endpoint_write_timeout,
            failure_policy: policy,
        };
        let mut provisioner = RecordingProvisioner::new("/tmp/fakebus-test");
        let endpoints = EndpointSet::provision(&mut provisioner, count).unwrap();
        let clients = (0..count).map(|i| provisioner.take_client(i)).collect();
        let (engine_line, line) = UnixStream::pair().unwrap();

        let running = Multiplexer::new(engine_line, endpoints, config)
            .unwrap()
            .start()
            .unwrap();

        line.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        Harness {
            running,
            provisioner,
            line,
            clients,
        }
    }

    fn read_exact_bytes(stream: &mut UnixStream, n: usize) -> Vec<u8> {
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = vec![0u8; n];
        stream.read_exact(&mut buf).unwrap();
        buf
    }

    fn assert_closed(stream: &mut UnixStream) {
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 1];
        match stream.read(&mut buf) {
            Ok(0) => {}
            Ok(_) => panic!("unexpected data after shutdown"),
            Err(err) if err.kind() == ErrorKind::ConnectionReset => {}
            Err(err) => panic!("expected closed channel, got {err}"),
        }
    }

    #[test]
    fn new_rejects_empty_endpoint_set() {
        let (line, _peer) = UnixStream::pair().unwrap();
        let result = Multiplexer::new(line, EndpointSet::new(Vec::new()), MuxConfig::default());
        assert!(matches!(result, Err(MuxError::NoEndpoints)));
    }

    #[test]
    fn physical_data_frame_reaches_all_endpoints() {
        let mut h = harness(2, FailurePolicy::FailFast);

        h.line.write_all(&[0x01, 0x03, 0x41, 0x42, 0x43]).unwrap();
        for client in &mut h.clients {
            assert_eq!(read_exact_bytes(client, 5), vec![0x01, 0x03, 0x41, 0x42, 0x43]);
        }

        h.running.shutdown_signal().trigger();
        let report = h.running.supervise(&mut h.provisioner);
        assert_eq!(report.cause, ShutdownCause::Requested);
        assert_eq!(report.frames_forwarded(ReaderId::Physical), Some(1));
    }

    #[test]
    fn physical_control_byte_reaches_all_endpoints() {
        let mut h = harness(3, FailurePolicy::FailFast);

        h.line.write_all(&[ACK]).unwrap();
        for client in &mut h.clients {
            assert_eq!(read_exact_bytes(client, 1), vec![ACK]);
        }

        h.running.shutdown_signal().trigger();
        h.running.supervise(&mut h.provisioner);
    }

    #[test]
    fn concurrent_endpoint_frames_arrive_whole() {
        let mut h = harness(2, FailurePolicy::FailFast);

        let mut first = h.clients[0].try_clone().unwrap();
        let mut second = h.clients[1].try_clone().unwrap();
        let a = std::thread::spawn(move || first.write_all(&[0x01, 0x02, 0xAA, 0xBB]).unwrap());
        let b = std::thread::spawn(move || second.write_all(&[0x01, 0x01, 0xCC]).unwrap());
        a.join().unwrap();
        b.join().unwrap();

        let wire = read_exact_bytes(&mut h.line, 7);
        let ab = vec![0x01, 0x02, 0xAA, 0xBB, 0x01, 0x01, 0xCC];
        let ba = vec![0x01, 0x01, 0xCC, 0x01, 0x02, 0xAA, 0xBB];
        assert!(wire == ab || wire == ba, "interleaved: {wire:02x?}");

        h.running.shutdown_signal().trigger();
        h.running.supervise(&mut h.provisioner);
    }

    #[test]
    fn endpoint_frames_keep_their_order() {
        let mut h = harness(1, FailurePolicy::FailFast);

        for seq in 0..20u8 {
            h.clients[0].write_all(&[0x01, 0x01, seq]).unwrap();
        }
        let wire = read_exact_bytes(&mut h.line, 60);
        let seqs: Vec<u8> = FrameDetector::new(std::io::Cursor::new(wire))
            .map(|frame| frame.unwrap().payload()[0])
            .collect();
        assert_eq!(seqs, (0..20).collect::<Vec<u8>>());

        h.running.shutdown_signal().trigger();
        h.running.supervise(&mut h.provisioner);
    }

    #[test]
    fn physical_disconnect_tears_everything_down() {
        let h = harness(2, FailurePolicy::FailFast);
        let Harness {
            running,
            mut provisioner,
            line,
            mut clients,
        } = h;
        let signal = running.shutdown_signal();

        drop(line);
        let started = Instant::now();
        while !signal.is_triggered() {
            assert!(started.elapsed() < Duration::from_secs(1), "signal never set");
            std::thread::sleep(Duration::from_millis(5));
        }

        let report = running.supervise(&mut provisioner);

        assert_eq!(report.cause, ShutdownCause::ReaderFailed(ReaderId::Physical));
        assert!(report.detached.is_empty());
        assert_eq!(report.readers.len(), 3);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(
            provisioner.deprovisioned(),
            vec!["/tmp/fakebus-test0", "/tmp/fakebus-test1"]
        );
        assert_eq!(report.deprovisioned.len(), 2);
        for client in &mut clients {
            assert_closed(client);
        }
    }

    #[test]
    fn endpoint_disconnect_fails_fast() {
        let h = harness(2, FailurePolicy::FailFast);
        let Harness {
            running,
            mut provisioner,
            mut line,
            mut clients,
        } = h;

        drop(clients.remove(1));
        let report = running.supervise(&mut provisioner);

        assert_eq!(report.cause, ShutdownCause::ReaderFailed(ReaderId::Endpoint(1)));
        assert_eq!(provisioner.deprovisioned().len(), 2);
        assert_closed(&mut line);
        assert_closed(&mut clients[0]);
    }

    #[test]
    fn isolated_endpoint_failure_keeps_others_running() {
        let h = harness(2, FailurePolicy::Isolate);
        let Harness {
            running,
            mut provisioner,
            mut line,
            mut clients,
        } = h;
        let signal = running.shutdown_signal();

        drop(clients.remove(0));
        std::thread::sleep(Duration::from_millis(100));
        assert!(!signal.is_triggered());

        line.write_all(&[ACK]).unwrap();
        assert_eq!(read_exact_bytes(&mut clients[0], 1), vec![ACK]);

        clients[0].write_all(&[0x01, 0x00]).unwrap();
        assert_eq!(read_exact_bytes(&mut line, 2), vec![0x01, 0x00]);

        signal.trigger();
        let report = running.supervise(&mut provisioner);
        assert_eq!(report.cause, ShutdownCause::Requested);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(provisioner.deprovisioned().len(), 2);
    }

    #[test]
    fn isolate_shuts_down_when_no_endpoint_is_left() {
        let h = harness(1, FailurePolicy::Isolate);
        let Harness {
            running,
            mut provisioner,
            line: _line,
            clients,
        } = h;

        drop(clients);
        let report = running.supervise(&mut provisioner);

        assert_eq!(report.cause, ShutdownCause::NoLiveEndpoints);
        assert_eq!(provisioner.deprovisioned(), vec!["/tmp/fakebus-test0"]);
    }

    #[test]
    fn dropped_endpoint_no_longer_reaches_the_line() {
        let h = harness(2, FailurePolicy::Isolate);
        let Harness {
            running,
            mut provisioner,
            mut line,
            mut clients,
        } = h;
        let signal = running.shutdown_signal();
        let liveness = running.liveness.clone();

        clients[1].shutdown(std::net::Shutdown::Read).unwrap();
        line.write_all(&[ACK]).unwrap();
        assert_eq!(read_exact_bytes(&mut clients[0], 1), vec![ACK]);

        let started = Instant::now();
        while liveness.is_alive(1) {
            assert!(started.elapsed() < Duration::from_secs(1), "endpoint never dropped");
            std::thread::sleep(Duration::from_millis(5));
        }

        let _ = clients[1].write_all(&[0x01, 0x01, 0xEE]);
        line.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let mut buf = [0u8; 3];
        match line.read(&mut buf) {
            Ok(n) => panic!("dropped endpoint reached the line: {:02x?}", &buf[..n]),
            Err(err) => assert!(
                matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
                "unexpected error: {err}"
            ),
        }
        assert!(!signal.is_triggered());

        signal.trigger();
        let report = running.supervise(&mut provisioner);
        assert_eq!(report.cause, ShutdownCause::Requested);
        assert!(report.failures().any(|r| r.reader == ReaderId::Endpoint(1)));
        assert!(report.failures().all(|r| r.reader == ReaderId::Endpoint(1)));
    }

    #[test]
    fn stalled_endpoint_is_dropped_without_stalling_the_bus() {
        const FRAMES: usize = 8192;
        const WIRE: usize = 257;

        let h = harness_with_write_timeout(2, FailurePolicy::Isolate, Duration::from_millis(100));
        let Harness {
            running,
            mut provisioner,
            line,
            mut clients,
        } = h;
        let signal = running.shutdown_signal();
        let liveness = running.liveness.clone();

        let mut frame = vec![0x01, 0xFF];
        frame.extend([0x5A; 255]);
        let mut feed = line.try_clone().unwrap();
        let writer = std::thread::spawn(move || {
            for _ in 0..FRAMES {
                feed.write_all(&frame).unwrap();
            }
        });

        // Endpoint 1 never reads, so its socket buffer fills and stays full.
        let received = read_exact_bytes(&mut clients[0], FRAMES * WIRE);
        writer.join().unwrap();

        assert!(received
            .chunks(WIRE)
            .all(|chunk| chunk[..2] == [0x01, 0xFF] && chunk[2..].iter().all(|&b| b == 0x5A)));
        assert!(!liveness.is_alive(1));
        assert!(liveness.is_alive(0));
        assert!(!signal.is_triggered());

        signal.trigger();
        let report = running.supervise(&mut provisioner);
        assert_eq!(report.cause, ShutdownCause::Requested);
        assert!(report.detached.is_empty());
        assert_eq!(report.frames_forwarded(ReaderId::Physical), Some(FRAMES as u64));
        assert!(report.failures().any(|r| r.reader == ReaderId::Endpoint(1)));
    }

    #[test]
    fn stalled_endpoint_fails_fast_instead_of_hanging() {
        let h = harness_with_write_timeout(1, FailurePolicy::FailFast, Duration::from_millis(50));
        let Harness {
            running,
            mut provisioner,
            line,
            clients: _clients,
        } = h;

        let mut feed = line.try_clone().unwrap();
        feed.set_write_timeout(Some(Duration::from_millis(100))).unwrap();
        let writer = std::thread::spawn(move || {
            let mut frame = vec![0x01, 0xFF];
            frame.extend([0x00; 255]);
            while feed.write_all(&frame).is_ok() {}
        });

        let started = Instant::now();
        let report = running.supervise(&mut provisioner);
        writer.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.cause, ShutdownCause::ReaderFailed(ReaderId::Physical));
        assert!(report.detached.is_empty());
    }

    fn report(reader: ReaderId, failed: bool, tripped_shutdown: bool) -> ReaderReport {
        ReaderReport {
            reader,
            outcome: if failed {
                ReaderOutcome::Failed(MuxError::ReaderPanicked(reader))
            } else {
                ReaderOutcome::Cancelled
            },
            frames: 0,
            tripped_shutdown,
        }
    }

    #[test]
    fn cause_names_the_reader_that_set_the_signal() {
        let readers = vec![
            report(ReaderId::Endpoint(0), true, false),
            report(ReaderId::Physical, true, true),
            report(ReaderId::Endpoint(1), false, false),
        ];
        assert_eq!(
            shutdown_cause(&readers, false),
            ShutdownCause::ReaderFailed(ReaderId::Physical)
        );
    }

    #[test]
    fn teardown_failures_do_not_become_the_cause() {
        let readers = vec![
            report(ReaderId::Endpoint(0), true, false),
            report(ReaderId::Physical, true, false),
        ];
        assert_eq!(shutdown_cause(&readers, false), ShutdownCause::Requested);
        assert_eq!(shutdown_cause(&readers, true), ShutdownCause::NoLiveEndpoints);
    }

    #[test]
    fn requested_shutdown_stops_idle_readers_promptly() {
        let mut h = harness(3, FailurePolicy::FailFast);

        let started = Instant::now();
        h.running.shutdown_signal().trigger();
        let report = h.running.supervise(&mut h.provisioner);

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.readers.len(), 4);
        assert!(report
            .readers
            .iter()
            .all(|r| matches!(r.outcome, ReaderOutcome::Cancelled)));
        assert!(report.detached.is_empty());
        assert_closed(&mut h.line);
    }
}
