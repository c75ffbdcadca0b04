//! Device handle running capture on a dedicated worker thread.
//!
//! The worker owns the camera for its whole life: it opens it, captures
//! into a small bounded channel, and closes it when asked to stop or when
//! the receiving side goes away. The supervisor waits on the channel with
//! a timeout, so a hung capture never blocks shutdown indefinitely.

use super::{CameraSource, Capture, DeviceError};
use crate::config::CaptureSettings;
use crossbeam_channel::{bounded, never, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Frames buffered between the worker and the supervisor.
const FRAME_BUFFER: usize = 2;

/// How long [`DeviceHandle::close`] waits for the worker to exit.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type CaptureResult = Result<Capture, DeviceError>;

/// An open capture device.
///
/// Dropping the handle stops the worker and releases the camera. The handle
/// never reopens itself after an error; that decision belongs to the
/// supervisor.
pub struct DeviceHandle {
    label: String,
    frames: Receiver<CaptureResult>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceHandle {
    /// Spawns the capture worker and waits for the camera to open.
    pub fn open(
        source: Arc<dyn CameraSource>,
        settings: &CaptureSettings,
    ) -> Result<Self, DeviceError> {
        let label = source.label();
        let (ready_tx, ready_rx) = bounded(1);
        let (frame_tx, frame_rx) = bounded(FRAME_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let settings = settings.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || capture_loop(source, settings, ready_tx, frame_tx, stop))
                .map_err(|e| DeviceError::OpenFailed {
                    device: label.clone(),
                    reason: format!("failed to spawn capture thread: {e}"),
                })?
        };

        let mut handle = Self {
            label,
            frames: frame_rx,
            stop,
            worker: Some(worker),
        };

        match ready_rx.recv_timeout(settings.open_timeout()) {
            Ok(Ok(())) => {
                tracing::info!(device = %handle.label, "Capture device opened");
                Ok(handle)
            }
            Ok(Err(e)) => {
                handle.shutdown();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                let device = handle.label.clone();
                handle.shutdown();
                Err(DeviceError::OpenFailed {
                    device,
                    reason: format!("device did not open within {:?}", settings.open_timeout()),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let device = handle.label.clone();
                handle.shutdown();
                Err(DeviceError::Disconnected(device))
            }
        }
    }

    /// Device name used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Waits up to `timeout` for the next frame.
    pub fn next_frame(&self, timeout: Duration) -> Result<Capture, DeviceError> {
        match self.frames.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DeviceError::CaptureTimeout {
                device: self.label.clone(),
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DeviceError::Disconnected(self.label.clone()))
            }
        }
    }

    /// Returns the first frame captured at or after `since`, with the
    /// number of older frames discarded on the way.
    ///
    /// At most the buffer plus the frame the worker holds can be stale, so
    /// after that many discards the next frame is returned as is.
    pub fn next_frame_since(
        &self,
        since: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<(Capture, usize), DeviceError> {
        let deadline = Instant::now() + timeout;
        let mut discarded = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let capture = self.next_frame(remaining)?;
            if capture.captured_at >= since || discarded > FRAME_BUFFER {
                return Ok((capture, discarded));
            }
            discarded += 1;
        }
    }

    /// Stops the worker and releases the camera.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Dropping the receiver unblocks a worker waiting on a full buffer.
        self.frames = never();

        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + CLOSE_GRACE;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if worker.is_finished() {
            if worker.join().is_err() {
                tracing::error!(device = %self.label, "Capture worker panicked");
            }
            tracing::info!(device = %self.label, "Capture device closed");
        } else {
            tracing::warn!(
                device = %self.label,
                "Capture worker still blocked in the driver, detaching it"
            );
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("label", &self.label)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn capture_loop(
    source: Arc<dyn CameraSource>,
    settings: CaptureSettings,
    ready: Sender<Result<(), DeviceError>>,
    frames: Sender<CaptureResult>,
    stop: Arc<AtomicBool>,
) {
    let mut camera = source.create();
    if let Err(e) = camera.open(&settings) {
        camera.close();
        let _ = ready.send(Err(e));
        return;
    }
    if ready.send(Ok(())).is_err() {
        camera.close();
        return;
    }

    while !stop.load(Ordering::Relaxed) {
        let result = camera.capture();
        let failed = result.is_err();
        if frames.send(result).is_err() || failed {
            break;
        }
    }

    camera.close();
}
