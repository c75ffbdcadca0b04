//! Supervisor loop: owns the device and the session, decides on retries.
//!
//! ```text
//! open device → open session → loop { capture → stamp → publish }
//!        ▲            ▲                       │
//!        └── backoff ─┴──── fault ────────────┘
//! ```
//!
//! Device faults close only the device; transient publish faults close
//! only the session. Permanent publish rejections and an exhausted retry
//! budget end the run. Frame numbering belongs to the supervisor, so it
//! carries across reopened devices and sessions.

mod policy;
mod state;

pub use policy::{BackoffPolicy, Decision, RecoveryTracker};
pub use state::{StreamStats, SupervisorState};

use crate::capture::{CameraSource, DeviceError, DeviceHandle, FrameSequencer};
use crate::config::{CaptureSettings, DriverSettings};
use crate::error::DriverError;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::publish::{FrameEncoder, PublishError, Publisher, SessionConnector, StreamSession};
use crate::shutdown::ShutdownSignal;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Unencodable frames in a row before the device is treated as faulty.
const MAX_UNENCODABLE_FRAMES: u32 = 30;

/// A failure observed during one cycle.
#[derive(Debug, Error)]
enum Fault {
    #[error("{0}")]
    Device(DeviceError),
    #[error("{0}")]
    Publish(PublishError),
}

impl Fault {
    fn kind(&self) -> &'static str {
        match self {
            Self::Device(_) => "device",
            Self::Publish(_) => "publish",
        }
    }
}

/// Drives capture and publishing until shutdown or a fatal error.
pub struct Supervisor<C: SessionConnector> {
    source: Arc<dyn CameraSource>,
    connector: C,
    publisher: Publisher,
    capture: CaptureSettings,
    recovery: RecoveryTracker,
    sequencer: FrameSequencer,
    stats: StreamStats,
    state: SupervisorState,
    shutdown: ShutdownSignal,
    metrics: Option<MetricsRegistry>,
    unencodable_in_row: u32,
    stale_before: Option<DateTime<Utc>>,
}

impl<C: SessionConnector> Supervisor<C> {
    /// Creates a supervisor in the `Starting` state. Nothing is opened
    /// until [`Supervisor::run`].
    pub fn new(
        settings: &DriverSettings,
        source: Arc<dyn CameraSource>,
        connector: C,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            connector,
            publisher: Publisher::new(FrameEncoder::new(settings.capture.jpeg_quality)),
            capture: settings.capture.clone(),
            recovery: RecoveryTracker::new(BackoffPolicy::from_settings(&settings.supervisor)),
            sequencer: FrameSequencer::new(),
            stats: StreamStats::default(),
            state: SupervisorState::Starting,
            shutdown,
            metrics: None,
            unencodable_in_row: 0,
            stale_before: None,
        }
    }

    /// Reports progress into `registry` as the run advances.
    pub fn with_metrics(mut self, registry: MetricsRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Counters accumulated so far.
    #[inline]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Runs until shutdown is requested or a fatal error occurs.
    ///
    /// The device and session are released before this returns, whatever
    /// the outcome.
    pub fn run(&mut self) -> Result<StreamStats, DriverError> {
        if self.state.is_terminal() {
            return Err(DriverError::Internal(format!(
                "supervisor already {}",
                self.state
            )));
        }

        tracing::info!(device = %self.source.label(), "Supervisor starting");
        self.report();

        let mut device: Option<DeviceHandle> = None;
        let mut session: Option<C::Session> = None;

        let outcome = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }
            let fault = match self.cycle(&mut device, &mut session) {
                Ok(()) => continue,
                Err(fault) => fault,
            };
            match &fault {
                Fault::Device(_) => {
                    if let Some(handle) = device.take() {
                        handle.close();
                    }
                }
                Fault::Publish(_) => {
                    if let Some(mut s) = session.take() {
                        s.close();
                    }
                }
            }
            if let Err(e) = self.recover(fault) {
                break Err(e);
            }
        };

        if let Some(mut s) = session.take() {
            s.close();
        }
        if let Some(handle) = device.take() {
            handle.close();
        }

        match outcome {
            Ok(()) => {
                self.transition(SupervisorState::Stopped);
                tracing::info!(
                    frames_published = self.stats.frames_published,
                    frames_dropped = self.stats.frames_dropped,
                    last_sequence = self.stats.last_sequence,
                    "Supervisor stopped"
                );
                self.report();
                Ok(self.stats.clone())
            }
            Err(e) => {
                self.transition(SupervisorState::Failed);
                tracing::error!(error = %e, exit_code = e.exit_code(), "Supervisor failed");
                self.report();
                Err(e)
            }
        }
    }

    /// Ensures the device and session are open, then moves one frame.
    fn cycle(
        &mut self,
        device: &mut Option<DeviceHandle>,
        session: &mut Option<C::Session>,
    ) -> Result<(), Fault> {
        let device_opened = device.is_none();
        if device_opened {
            self.stale_before = None;
            let handle = DeviceHandle::open(Arc::clone(&self.source), &self.capture)
                .map_err(Fault::Device)?;
            if self.stats.device_opens > 0 {
                self.stats.device_reopens += 1;
            }
            self.stats.device_opens += 1;
            *device = Some(handle);
        }

        if session.is_none() {
            let resume_sequence = self.sequencer.next_sequence();
            let opened = self
                .connector
                .connect(resume_sequence)
                .map_err(Fault::Publish)?;
            if self.stats.sessions_opened > 0 {
                self.stats.session_reconnects += 1;
                // Frames buffered by a device that kept running through
                // the backoff are older than the new session.
                if !device_opened {
                    self.stale_before = Some(Utc::now());
                }
            }
            self.stats.sessions_opened += 1;
            *session = Some(opened);
        }

        let (Some(handle), Some(session)) = (device.as_ref(), session.as_mut()) else {
            return Err(Fault::Device(DeviceError::NotInitialized));
        };

        let capture = match self.stale_before.take() {
            Some(since) => {
                let (capture, discarded) = handle
                    .next_frame_since(since, self.capture.frame_timeout())
                    .map_err(Fault::Device)?;
                if discarded > 0 {
                    tracing::debug!(discarded, "Discarded frames captured before reconnect");
                    self.stats.frames_captured += discarded as u64;
                    self.stats.frames_dropped += discarded as u64;
                }
                capture
            }
            None => handle
                .next_frame(self.capture.frame_timeout())
                .map_err(Fault::Device)?,
        };
        self.stats.frames_captured += 1;
        let frame = self.sequencer.stamp(capture);

        match self.publisher.publish(session, &frame) {
            Ok(bytes) => {
                self.unencodable_in_row = 0;
                self.stats.frames_published += 1;
                self.stats.bytes_published += bytes as u64;
                self.stats.last_sequence = frame.sequence();
            }
            Err(e) => {
                self.stats.frames_dropped += 1;
                if e.is_frame_local() {
                    tracing::warn!(sequence = frame.sequence(), error = %e, "Dropping frame");
                    self.unencodable_in_row += 1;
                    if self.unencodable_in_row >= MAX_UNENCODABLE_FRAMES {
                        self.unencodable_in_row = 0;
                        return Err(Fault::Device(DeviceError::CaptureFailed {
                            device: handle.label().to_string(),
                            reason: format!(
                                "{MAX_UNENCODABLE_FRAMES} consecutive frames could not be encoded"
                            ),
                        }));
                    }
                    self.report();
                    return Ok(());
                }
                return Err(Fault::Publish(e));
            }
        }

        if self.state != SupervisorState::Streaming {
            self.transition(SupervisorState::Streaming);
            tracing::info!(
                device = %handle.label(),
                session = %session.id(),
                sequence = frame.sequence(),
                "Streaming"
            );
        }
        if self.recovery.record_success() {
            tracing::info!(
                frames = self.recovery.policy().reset_after_frames(),
                "Stream stable, retry budget reset"
            );
        }
        self.stats.consecutive_failures = self.recovery.consecutive_failures();
        self.report();
        Ok(())
    }

    /// Classifies a fault and waits out the backoff, or returns the fatal error.
    fn recover(&mut self, fault: Fault) -> Result<(), DriverError> {
        let fault = match fault {
            Fault::Publish(e) if e.is_permanent() => return Err(DriverError::Rejected(e)),
            other => other,
        };

        let decision = self.recovery.record_failure();
        self.stats.consecutive_failures = self.recovery.consecutive_failures();

        match decision {
            Decision::GiveUp { attempts } => Err(match fault {
                Fault::Device(source) => DriverError::DeviceExhausted { attempts, source },
                Fault::Publish(source) => DriverError::PublishExhausted { attempts, source },
            }),
            Decision::Retry { attempt, delay } => {
                self.transition(SupervisorState::Recovering);
                tracing::warn!(
                    fault = fault.kind(),
                    error = %fault,
                    attempt,
                    max_retries = self.recovery.policy().max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after failure"
                );
                self.report();
                if self.shutdown.wait_timeout(delay) {
                    tracing::debug!("Backoff interrupted by shutdown");
                }
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state == next || !self.state.can_transition_to(next) {
            return;
        }
        tracing::info!(from = %self.state, to = %next, "Supervisor state changed");
        self.state = next;
    }

    fn report(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update(&MetricsSnapshot::from_stats(&self.stats, self.state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Camera, Capture, ColorImage, SyntheticCamera, SyntheticSource};
    use crate::config::{CaptureSettings, SupervisorSettings};
    use crate::publish::{decode_header, EncodedFrame};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn settings(max_retries: u32) -> DriverSettings {
        DriverSettings {
            capture: CaptureSettings {
                frame_timeout_ms: 500,
                open_timeout_ms: 1_000,
                ..CaptureSettings::with_dimensions(8, 8)
            },
            supervisor: SupervisorSettings {
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                max_retries,
                reset_after_frames: 2,
                jitter: 0.0,
            },
            ..DriverSettings::default()
        }
    }

    /// Camera whose open always fails.
    struct Unplugged;

    impl Camera for Unplugged {
        fn open(&mut self, _: &CaptureSettings) -> Result<(), DeviceError> {
            Err(DeviceError::NotFound("/dev/video0".to_string()))
        }
        fn capture(&mut self) -> Result<Capture, DeviceError> {
            Err(DeviceError::NotInitialized)
        }
        fn is_open(&self) -> bool {
            false
        }
        fn close(&mut self) {}
    }

    /// Fails to open `failures` times, then yields synthetic frames.
    struct FlakySource {
        failures: AtomicUsize,
        opened: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                opened: AtomicUsize::new(0),
            }
        }
    }

    impl CameraSource for FlakySource {
        fn label(&self) -> String {
            "/dev/video0".to_string()
        }
        fn create(&self) -> Box<dyn Camera> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                Box::new(Unplugged)
            } else {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Box::new(SyntheticCamera::new(false).unpaced())
            }
        }
    }

    /// Yields `frames` synthetic frames, then fails capture.
    struct Dying {
        inner: SyntheticCamera,
        frames: usize,
    }

    impl Camera for Dying {
        fn open(&mut self, settings: &CaptureSettings) -> Result<(), DeviceError> {
            self.inner.open(settings)
        }
        fn capture(&mut self) -> Result<Capture, DeviceError> {
            if self.frames == 0 {
                return Err(DeviceError::CaptureFailed {
                    device: "/dev/video0".to_string(),
                    reason: "device unplugged".to_string(),
                });
            }
            self.frames -= 1;
            self.inner.capture()
        }
        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
        fn close(&mut self) {
            self.inner.close();
        }
    }

    /// First camera dies after `frames` frames; later ones keep going.
    struct DyingSource {
        frames: usize,
        created: AtomicUsize,
    }

    impl CameraSource for DyingSource {
        fn label(&self) -> String {
            "/dev/video0".to_string()
        }
        fn create(&self) -> Box<dyn Camera> {
            let inner = SyntheticCamera::new(false).unpaced();
            if self.created.fetch_add(1, Ordering::SeqCst) == 0 {
                Box::new(Dying {
                    inner,
                    frames: self.frames,
                })
            } else {
                Box::new(inner)
            }
        }
    }

    /// Delivers frames whose pixel buffer does not match their size.
    struct Garbled;

    impl Camera for Garbled {
        fn open(&mut self, _: &CaptureSettings) -> Result<(), DeviceError> {
            Ok(())
        }
        fn capture(&mut self) -> Result<Capture, DeviceError> {
            Ok(Capture::now(ColorImage::new(8, 8, vec![0u8; 5]), None))
        }
        fn is_open(&self) -> bool {
            true
        }
        fn close(&mut self) {}
    }

    struct GarbledSource;

    impl CameraSource for GarbledSource {
        fn label(&self) -> String {
            "/dev/video0".to_string()
        }
        fn create(&self) -> Box<dyn Camera> {
            Box::new(Garbled)
        }
    }

    #[derive(Debug, Default)]
    struct Log {
        connects: Vec<u64>,
        /// Sequences accepted, tagged with the session that accepted them.
        accepted: Vec<(usize, u64)>,
        closes: usize,
    }

    /// Scripted endpoint. Stops the run after `stop_after` accepted frames.
    struct ScriptedConnector {
        log: Arc<Mutex<Log>>,
        shutdown: ShutdownSignal,
        stop_after: usize,
        connect_error: Option<fn() -> PublishError>,
        /// Session index and per-session send count at which a send fails.
        fail_send: Option<(usize, usize)>,
        send_error: fn() -> PublishError,
    }

    impl ScriptedConnector {
        fn new(shutdown: &ShutdownSignal, stop_after: usize) -> Self {
            Self {
                log: Arc::new(Mutex::new(Log::default())),
                shutdown: shutdown.clone(),
                stop_after,
                connect_error: None,
                fail_send: None,
                send_error: || PublishError::Unavailable {
                    endpoint: "scripted".to_string(),
                    status: 503,
                },
            }
        }
    }

    struct ScriptedSession {
        index: usize,
        sends: usize,
        fail_at: Option<usize>,
        send_error: fn() -> PublishError,
        log: Arc<Mutex<Log>>,
        shutdown: ShutdownSignal,
        stop_after: usize,
    }

    impl SessionConnector for ScriptedConnector {
        type Session = ScriptedSession;

        fn connect(&self, resume_sequence: u64) -> Result<ScriptedSession, PublishError> {
            let mut log = self.log.lock().unwrap();
            log.connects.push(resume_sequence);
            if let Some(error) = self.connect_error {
                return Err(error());
            }
            let index = log.connects.len() - 1;
            Ok(ScriptedSession {
                index,
                sends: 0,
                fail_at: self
                    .fail_send
                    .and_then(|(session, at)| (session == index).then_some(at)),
                send_error: self.send_error,
                log: Arc::clone(&self.log),
                shutdown: self.shutdown.clone(),
                stop_after: self.stop_after,
            })
        }
    }

    impl StreamSession for ScriptedSession {
        fn id(&self) -> &str {
            "scripted"
        }

        fn send(&mut self, frame: EncodedFrame) -> Result<(), PublishError> {
            self.sends += 1;
            if self.fail_at == Some(self.sends) {
                return Err((self.send_error)());
            }
            let (header, _) = decode_header(frame.body())?;
            assert_eq!(header.sequence, frame.sequence());

            let mut log = self.log.lock().unwrap();
            log.accepted.push((self.index, frame.sequence()));
            if log.accepted.len() >= self.stop_after {
                self.shutdown.trigger();
            }
            Ok(())
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closes += 1;
        }
    }

    #[test]
    fn test_recovers_from_device_failures() {
        let shutdown = ShutdownSignal::new();
        let source = Arc::new(FlakySource::new(3));
        let connector = ScriptedConnector::new(&shutdown, 5);
        let log = Arc::clone(&connector.log);

        let mut supervisor =
            Supervisor::new(&settings(5), source.clone(), connector, shutdown);
        let stats = supervisor.run().unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert_eq!(source.opened.load(Ordering::SeqCst), 1);
        assert_eq!(stats.frames_published, 5);
        assert_eq!(stats.last_sequence, 5);
        assert_eq!(stats.consecutive_failures, 0);

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec![1]);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_device_failures_beyond_budget_are_fatal() {
        let shutdown = ShutdownSignal::new();
        let source = Arc::new(FlakySource::new(usize::MAX));
        let connector = ScriptedConnector::new(&shutdown, 1);

        let mut supervisor = Supervisor::new(&settings(3), source, connector, shutdown);
        let err = supervisor.run().unwrap_err();

        assert!(matches!(
            err,
            DriverError::DeviceExhausted { attempts: 4, .. }
        ));
        assert_eq!(err.exit_code(), 69);
        assert_eq!(supervisor.state(), SupervisorState::Failed);
    }

    #[test]
    fn test_transient_publish_failure_reconnects_and_continues_numbering() {
        let shutdown = ShutdownSignal::new();
        let mut connector = ScriptedConnector::new(&shutdown, 6);
        connector.fail_send = Some((0, 3));
        let log = Arc::clone(&connector.log);

        let mut supervisor = Supervisor::new(
            &settings(5),
            Arc::new(SyntheticSource::new(false).unpaced()),
            connector,
            shutdown,
        );
        let stats = supervisor.run().unwrap();

        let log = log.lock().unwrap();
        // Frame 3 was lost with the first session.
        assert_eq!(log.connects, vec![1, 4]);
        assert_eq!(log.closes, 2);
        assert_eq!(stats.session_reconnects, 1);
        // Frame 3, plus whatever the device buffered during the backoff.
        assert!(stats.frames_dropped >= 1);
        assert_eq!(
            stats.frames_captured,
            stats.frames_published + stats.frames_dropped
        );

        let sequences: Vec<u64> = log.accepted.iter().map(|(_, s)| *s).collect();
        assert_eq!(sequences, vec![1, 2, 4, 5, 6, 7]);
        assert!(log.accepted.iter().skip(2).all(|(session, _)| *session == 1));
        assert_eq!(stats.last_sequence, 7);
    }

    #[test]
    fn test_device_failure_mid_stream_reopens_and_keeps_numbering() {
        let shutdown = ShutdownSignal::new();
        let source = Arc::new(DyingSource {
            frames: 3,
            created: AtomicUsize::new(0),
        });
        let connector = ScriptedConnector::new(&shutdown, 6);
        let log = Arc::clone(&connector.log);

        let mut supervisor =
            Supervisor::new(&settings(5), source.clone(), connector, shutdown);
        let stats = supervisor.run().unwrap();

        assert_eq!(source.created.load(Ordering::SeqCst), 2);
        assert_eq!(stats.device_reopens, 1);
        assert_eq!(stats.session_reconnects, 0);
        assert_eq!(stats.last_sequence, 6);

        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec![1]);
        let sequences: Vec<u64> = log.accepted.iter().map(|(_, s)| *s).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_expired_session_reconnects() {
        let shutdown = ShutdownSignal::new();
        let mut connector = ScriptedConnector::new(&shutdown, 4);
        connector.fail_send = Some((0, 2));
        connector.send_error = || PublishError::SessionExpired {
            endpoint: "scripted/sessions/s-1/frames".to_string(),
        };
        let log = Arc::clone(&connector.log);

        let mut supervisor = Supervisor::new(
            &settings(5),
            Arc::new(SyntheticSource::new(false).unpaced()),
            connector,
            shutdown,
        );
        let stats = supervisor.run().unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert_eq!(stats.session_reconnects, 1);
        let log = log.lock().unwrap();
        assert_eq!(log.connects, vec![1, 3]);
        let sequences: Vec<u64> = log.accepted.iter().map(|(_, s)| *s).collect();
        assert_eq!(sequences, vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_unencodable_frames_count_as_device_fault() {
        let shutdown = ShutdownSignal::new();
        let connector = ScriptedConnector::new(&shutdown, 1);
        let log = Arc::clone(&connector.log);

        let mut supervisor =
            Supervisor::new(&settings(2), Arc::new(GarbledSource), connector, shutdown);
        let err = supervisor.run().unwrap_err();

        assert!(matches!(err, DriverError::DeviceExhausted { attempts: 3, .. }));
        assert_eq!(err.exit_code(), 69);
        let stats = supervisor.stats();
        assert_eq!(stats.frames_published, 0);
        assert_eq!(stats.frames_dropped, 3 * u64::from(MAX_UNENCODABLE_FRAMES));
        assert_eq!(stats.device_reopens, 2);
        assert_eq!(log.lock().unwrap().connects, vec![1]);
    }

    #[test]
    fn test_auth_rejection_is_fatal_without_retry() {
        let shutdown = ShutdownSignal::new();
        let mut connector = ScriptedConnector::new(&shutdown, 1);
        connector.connect_error = Some(|| PublishError::AuthRejected {
            endpoint: "scripted".to_string(),
            status: 401,
        });
        let log = Arc::clone(&connector.log);

        let mut supervisor = Supervisor::new(
            &settings(5),
            Arc::new(SyntheticSource::new(false).unpaced()),
            connector,
            shutdown,
        );
        let err = supervisor.run().unwrap_err();

        assert_eq!(err.exit_code(), 77);
        assert_eq!(log.lock().unwrap().connects.len(), 1);
        assert_eq!(supervisor.state(), SupervisorState::Failed);
    }

    #[test]
    fn test_unreachable_endpoint_exhausts_budget() {
        let shutdown = ShutdownSignal::new();
        let mut connector = ScriptedConnector::new(&shutdown, 1);
        connector.connect_error = Some(|| PublishError::Timeout {
            endpoint: "scripted".to_string(),
        });
        let log = Arc::clone(&connector.log);

        let mut supervisor = Supervisor::new(
            &settings(2),
            Arc::new(SyntheticSource::new(false).unpaced()),
            connector,
            shutdown,
        );
        let err = supervisor.run().unwrap_err();

        assert!(matches!(err, DriverError::PublishExhausted { attempts: 3, .. }));
        assert_eq!(err.exit_code(), 75);
        assert_eq!(log.lock().unwrap().connects, vec![1, 1, 1]);
    }

    #[test]
    fn test_shutdown_before_start_stops_cleanly() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let connector = ScriptedConnector::new(&shutdown, 1);
        let log = Arc::clone(&connector.log);

        let mut supervisor = Supervisor::new(
            &settings(5),
            Arc::new(SyntheticSource::new(false).unpaced()),
            connector,
            shutdown,
        );
        let stats = supervisor.run().unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert_eq!(stats, StreamStats::default());
        assert!(log.lock().unwrap().connects.is_empty());
        assert!(supervisor.run().is_err());
    }

    #[test]
    fn test_metrics_follow_run() {
        let shutdown = ShutdownSignal::new();
        let connector = ScriptedConnector::new(&shutdown, 3);
        let registry = MetricsRegistry::new().unwrap();

        let mut supervisor = Supervisor::new(
            &settings(5),
            Arc::new(SyntheticSource::new(true).unpaced()),
            connector,
            shutdown,
        )
        .with_metrics(registry.clone());
        supervisor.run().unwrap();

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_driver_frames_published_total 3"));
        assert!(output.contains("camera_driver_state 4"));
    }
}
