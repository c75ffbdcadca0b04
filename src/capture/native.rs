//! Native V4L2/AVFoundation/MSMF capture through nokhwa.
//!
//! The color stream goes through nokhwa. Z16 depth nodes are read through
//! V4L2 directly, so depth capture is Linux only.

#[cfg(target_os = "linux")]
use super::depth::DepthStream;
use super::{check_node, Camera, CameraSource, Capture, ColorImage, DeviceError};
use crate::config::{CaptureSettings, DriverConfig, VideoDevice};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera as NokhwaDevice;
use std::path::{Path, PathBuf};

fn camera_index(device: &VideoDevice) -> CameraIndex {
    match (device.index(), device) {
        (Some(index), _) => CameraIndex::Index(index),
        (None, VideoDevice::Path(path)) => CameraIndex::String(path.display().to_string()),
        (None, VideoDevice::Index(index)) => CameraIndex::Index(*index),
    }
}

/// A hardware camera, optionally paired with a depth stream.
pub struct NativeCamera {
    video: VideoDevice,
    video_node: PathBuf,
    depth_node: Option<PathBuf>,
    color_stream: Option<NokhwaDevice>,
    #[cfg(target_os = "linux")]
    depth_stream: Option<DepthStream>,
}

impl NativeCamera {
    fn open_failed(device: &VideoDevice, err: impl std::fmt::Display) -> DeviceError {
        DeviceError::OpenFailed {
            device: device.to_string(),
            reason: err.to_string(),
        }
    }

    fn capture_failed(device: &VideoDevice, err: impl std::fmt::Display) -> DeviceError {
        DeviceError::CaptureFailed {
            device: device.to_string(),
            reason: err.to_string(),
        }
    }

    #[cfg(target_os = "linux")]
    fn open_depth(&mut self, settings: &CaptureSettings) -> Result<(), DeviceError> {
        if let Some(node) = &self.depth_node {
            check_node(node)?;
            self.depth_stream = Some(DepthStream::open(node, settings)?);
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn open_depth(&mut self, _settings: &CaptureSettings) -> Result<(), DeviceError> {
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn capture_depth(&mut self) -> Result<Option<super::DepthImage>, DeviceError> {
        self.depth_stream
            .as_mut()
            .map(DepthStream::capture)
            .transpose()
    }

    #[cfg(not(target_os = "linux"))]
    fn capture_depth(&mut self) -> Result<Option<super::DepthImage>, DeviceError> {
        Ok(None)
    }
}

impl Camera for NativeCamera {
    fn open(&mut self, settings: &CaptureSettings) -> Result<(), DeviceError> {
        check_node(&self.video_node)?;

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(settings.width, settings.height),
                FrameFormat::MJPEG,
                settings.fps,
            ),
        ));
        let mut color = NokhwaDevice::new(camera_index(&self.video), format)
            .map_err(|e| Self::open_failed(&self.video, e))?;
        color
            .open_stream()
            .map_err(|e| Self::open_failed(&self.video, e))?;
        tracing::info!(
            device = %self.video,
            format = ?color.camera_format(),
            "Color stream opened"
        );
        self.color_stream = Some(color);

        self.open_depth(settings)
    }

    fn capture(&mut self) -> Result<Capture, DeviceError> {
        let video = self.video.clone();
        let stream = self
            .color_stream
            .as_mut()
            .ok_or(DeviceError::NotInitialized)?;
        let buffer = stream
            .frame()
            .map_err(|e| Self::capture_failed(&video, e))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Self::capture_failed(&video, e))?;
        let (width, height) = image.dimensions();
        let color = ColorImage::new(width, height, image.into_raw());

        let depth = self.capture_depth()?;
        Ok(Capture::now(color, depth))
    }

    fn is_open(&self) -> bool {
        self.color_stream.is_some()
    }

    fn close(&mut self) {
        stop_stream(self.color_stream.take(), &self.video);
        #[cfg(target_os = "linux")]
        if self.depth_stream.take().is_some() {
            tracing::debug!(video = %self.video, "Depth stream stopped");
        }
    }
}

fn stop_stream(stream: Option<NokhwaDevice>, device: &VideoDevice) {
    if let Some(mut stream) = stream {
        if let Err(e) = stream.stop_stream() {
            tracing::warn!(device = %device, error = %e, "Failed to stop stream");
        }
    }
}

/// Creates [`NativeCamera`]s for the configured devices.
#[derive(Debug, Clone)]
pub struct NativeSource {
    video: VideoDevice,
    video_node: PathBuf,
    depth_node: Option<PathBuf>,
}

impl NativeSource {
    /// Resolves device nodes under `/dev`.
    pub fn from_config(config: &DriverConfig) -> Self {
        Self::with_dev_root(config, Path::new("/dev"))
    }

    fn with_dev_root(config: &DriverConfig, dev_root: &Path) -> Self {
        let depth_node = match (config.is_depth_camera, &config.depth_device) {
            (true, Some(device)) if cfg!(target_os = "linux") => Some(device.node_path(dev_root)),
            (true, Some(_)) => {
                tracing::warn!("Raw depth capture needs V4L2; streaming color only");
                None
            }
            (true, None) => {
                tracing::warn!("Depth camera configured without depth_device; streaming color only");
                None
            }
            (false, _) => None,
        };
        Self {
            video_node: config.video_device.node_path(dev_root),
            video: config.video_device.clone(),
            depth_node,
        }
    }

    /// The depth node read next to the color stream, if any.
    pub fn depth_node(&self) -> Option<&Path> {
        self.depth_node.as_deref()
    }
}

impl CameraSource for NativeSource {
    fn label(&self) -> String {
        self.video.to_string()
    }

    fn create(&self) -> Box<dyn Camera> {
        Box::new(NativeCamera {
            video: self.video.clone(),
            video_node: self.video_node.clone(),
            depth_node: self.depth_node.clone(),
            color_stream: None,
            #[cfg(target_os = "linux")]
            depth_stream: None,
        })
    }
}
