//! Raw Z16 depth capture through V4L2.
//!
//! Depth nodes (RealSense and similar) only offer the `Z16 ` fourcc, which
//! the color path's decoders do not know about. The node is opened directly
//! and its memory-mapped buffers are read as little-endian 16-bit samples.

use super::{DepthImage, DeviceError};
use crate::config::CaptureSettings;
use std::path::Path;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

const Z16: &[u8; 4] = b"Z16 ";
const BUFFER_COUNT: u32 = 4;

/// An open depth node streaming Z16 frames.
pub(super) struct DepthStream {
    label: String,
    width: u32,
    height: u32,
    stream: MmapStream<'static>,
}

impl DepthStream {
    /// Negotiates Z16 at the capture resolution and starts streaming.
    pub(super) fn open(node: &Path, settings: &CaptureSettings) -> Result<Self, DeviceError> {
        let label = node.display().to_string();
        let open_failed = |reason: String| DeviceError::OpenFailed {
            device: label.clone(),
            reason,
        };

        let device = Device::with_path(node).map_err(|e| open_failed(e.to_string()))?;
        let requested = Format::new(settings.width, settings.height, FourCC::new(Z16));
        let format =
            Capture::set_format(&device, &requested).map_err(|e| open_failed(e.to_string()))?;
        let (width, height) = check_format(&format).map_err(open_failed)?;

        if let Err(e) = Capture::set_params(&device, &Parameters::with_fps(settings.fps)) {
            tracing::warn!(device = %label, error = %e, "Depth node ignored frame rate");
        }

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| open_failed(e.to_string()))?;

        tracing::info!(device = %label, width, height, "Depth stream opened");
        Ok(Self {
            label,
            width,
            height,
            stream,
        })
    }

    /// Blocks for the next depth frame.
    pub(super) fn capture(&mut self) -> Result<DepthImage, DeviceError> {
        let (data, meta) =
            CaptureStream::next(&mut self.stream).map_err(|e| DeviceError::CaptureFailed {
                device: self.label.clone(),
                reason: e.to_string(),
            })?;
        let used = match meta.bytesused as usize {
            0 => data.len(),
            n => n.min(data.len()),
        };
        depth_from_buffer(self.width, self.height, &data[..used]).map_err(|reason| {
            DeviceError::CaptureFailed {
                device: self.label.clone(),
                reason,
            }
        })
    }
}

/// Accepts only Z16; returns the negotiated size.
fn check_format(format: &Format) -> Result<(u32, u32), String> {
    if format.fourcc != FourCC::new(Z16) {
        return Err(format!("depth node does not offer Z16 (got {})", format.fourcc));
    }
    if format.width == 0 || format.height == 0 {
        return Err("depth node negotiated an empty frame size".to_string());
    }
    Ok((format.width, format.height))
}

/// Decodes one Z16 buffer, ignoring driver padding past the last row.
fn depth_from_buffer(width: u32, height: u32, data: &[u8]) -> Result<DepthImage, String> {
    let expected = (width as usize) * (height as usize) * 2;
    data.get(..expected)
        .and_then(|raw| DepthImage::from_z16_le(width, height, raw))
        .ok_or_else(|| {
            format!(
                "depth buffer of {} bytes is short for Z16 at {width}x{height}",
                data.len()
            )
        })
}
