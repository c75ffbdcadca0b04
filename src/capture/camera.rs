//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and synthetic implementations for
//! dry runs and testing.

use super::{Capture, ColorImage, DepthImage};
use crate::config::CaptureSettings;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during camera operations.
///
/// All of these are recoverable from the supervisor's point of view.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Nothing exists at the device path.
    #[error("camera device not found: {0}")]
    NotFound(String),
    /// The node exists but cannot be opened by this user.
    #[error("permission denied opening camera device {0}")]
    PermissionDenied(String),
    /// The driver refused to open or configure the device.
    #[error("failed to open camera {device}: {reason}")]
    OpenFailed { device: String, reason: String },
    /// A frame could not be read.
    #[error("failed to capture frame from {device}: {reason}")]
    CaptureFailed { device: String, reason: String },
    /// No frame arrived in time.
    #[error("no frame from {device} within {timeout:?}")]
    CaptureTimeout { device: String, timeout: Duration },
    /// The capture worker went away.
    #[error("capture worker for {0} stopped unexpectedly")]
    Disconnected(String),
    /// Capture was attempted before `open`.
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and synthetic implementations for testing.
pub trait Camera {
    /// Opens and initializes the camera with the given settings.
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), DeviceError>;

    /// Captures a single frame, blocking until the hardware delivers one.
    fn capture(&mut self) -> Result<Capture, DeviceError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

/// Creates cameras on demand.
///
/// The device handle calls [`CameraSource::create`] on its capture thread,
/// so camera implementations need not be `Send`.
pub trait CameraSource: Send + Sync + 'static {
    /// Human-readable device name used in logs and errors.
    fn label(&self) -> String;

    /// Builds a fresh, unopened camera.
    fn create(&self) -> Box<dyn Camera>;
}

/// Checks that a device node can be opened for reading.
pub fn check_node(path: &Path) -> Result<(), DeviceError> {
    let device = path.display().to_string();
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DeviceError::NotFound(device)),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(DeviceError::PermissionDenied(device))
        }
        Err(e) => Err(DeviceError::OpenFailed {
            device,
            reason: e.to_string(),
        }),
    }
}

/// Synthetic camera producing a moving test pattern.
#[derive(Debug)]
pub struct SyntheticCamera {
    settings: Option<CaptureSettings>,
    with_depth: bool,
    paced: bool,
    tick: u64,
    last_capture: Option<Instant>,
}

impl SyntheticCamera {
    /// A camera producing a moving test pattern, paced to the configured rate.
    pub fn new(with_depth: bool) -> Self {
        Self {
            settings: None,
            with_depth,
            paced: true,
            tick: 0,
            last_capture: None,
        }
    }

    /// Delivers frames as fast as they are requested.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    fn pace(&mut self, interval: Duration) {
        if let Some(last) = self.last_capture {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
    }
}

impl Camera for SyntheticCamera {
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), DeviceError> {
        settings.validate().map_err(|e| DeviceError::OpenFailed {
            device: "synthetic".to_string(),
            reason: e.to_string(),
        })?;
        self.settings = Some(settings.clone());
        self.tick = 0;
        self.last_capture = None;
        tracing::info!(
            width = settings.width,
            height = settings.height,
            depth = self.with_depth,
            "Synthetic camera opened"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Capture, DeviceError> {
        let settings = self.settings.clone().ok_or(DeviceError::NotInitialized)?;
        if self.paced {
            self.pace(settings.frame_interval());
        }

        let (width, height) = (settings.width, settings.height);
        let shift = self.tick;
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height as u64 {
            for x in 0..width as u64 {
                rgb.push(((x + shift) % 256) as u8);
                rgb.push(((y + shift) % 256) as u8);
                rgb.push(((x + y) % 256) as u8);
            }
        }

        let depth = self.with_depth.then(|| {
            let values = (0..(width * height) as u64)
                .map(|i| (500 + (i + shift) % 3500) as u16)
                .collect();
            DepthImage::new(width, height, values)
        });

        self.tick += 1;
        Ok(Capture::now(ColorImage::new(width, height, rgb), depth))
    }

    fn is_open(&self) -> bool {
        self.settings.is_some()
    }

    fn close(&mut self) {
        self.settings = None;
        tracing::info!("Synthetic camera closed");
    }
}

/// Source for [`SyntheticCamera`]s.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    with_depth: bool,
    paced: bool,
}

impl SyntheticSource {
    /// A source of paced synthetic cameras.
    pub fn new(with_depth: bool) -> Self {
        Self {
            with_depth,
            paced: true,
        }
    }

    /// Capture as fast as the consumer reads.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

impl CameraSource for SyntheticSource {
    fn label(&self) -> String {
        "synthetic".to_string()
    }

    fn create(&self) -> Box<dyn Camera> {
        let camera = SyntheticCamera::new(self.with_depth);
        if self.paced {
            Box::new(camera)
        } else {
            Box::new(camera.unpaced())
        }
    }
}
