//! Captured images and sequenced frames.

use chrono::{DateTime, Utc};

/// An 8-bit RGB image.
#[derive(Clone, PartialEq, Eq)]
pub struct ColorImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl ColorImage {
    /// Wraps an interleaved RGB buffer.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        Self { width, height, rgb }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved RGB bytes, row-major.
    #[inline]
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    /// Validates that the buffer size matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgb.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

/// A 16-bit depth image, one value per pixel in sensor units (usually mm).
#[derive(Clone, PartialEq, Eq)]
pub struct DepthImage {
    width: u32,
    height: u32,
    depth: Vec<u16>,
}

impl DepthImage {
    /// Wraps one depth value per pixel, row-major.
    pub fn new(width: u32, height: u32, depth: Vec<u16>) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Builds a depth image from a little-endian Z16 buffer.
    pub fn from_z16_le(width: u32, height: u32, raw: &[u8]) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 2;
        if raw.len() != expected {
            return None;
        }
        let depth = raw
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();
        Some(Self::new(width, height, depth))
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Depth values, row-major.
    #[inline]
    pub fn values(&self) -> &[u16] {
        &self.depth
    }

    /// Validates that the value count matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.depth.len() == (self.width as usize) * (self.height as usize)
    }
}

/// Raw output of one capture tick, before sequencing.
#[derive(Clone)]
pub struct Capture {
    /// Color plane.
    pub color: ColorImage,
    /// Depth plane, for depth cameras.
    pub depth: Option<DepthImage>,
    /// When the worker read the frame.
    pub captured_at: DateTime<Utc>,
}

impl Capture {
    /// Wraps images captured now.
    pub fn now(color: ColorImage, depth: Option<DepthImage>) -> Self {
        Self {
            color,
            depth,
            captured_at: Utc::now(),
        }
    }
}

/// A sequenced frame ready for publishing.
///
/// Frames are never persisted: the publisher consumes and drops them.
#[derive(Clone)]
pub struct Frame {
    sequence: u64,
    captured_at: DateTime<Utc>,
    color: ColorImage,
    depth: Option<DepthImage>,
}

impl Frame {
    /// Stamps a capture with `sequence`.
    pub fn new(sequence: u64, capture: Capture) -> Self {
        Self {
            sequence,
            captured_at: capture.captured_at,
            color: capture.color,
            depth: capture.depth,
        }
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Color plane.
    #[inline]
    pub fn color(&self) -> &ColorImage {
        &self.color
    }

    /// Depth plane, if captured.
    #[inline]
    pub fn depth(&self) -> Option<&DepthImage> {
        self.depth.as_ref()
    }

    /// Validates every plane.
    pub fn is_valid(&self) -> bool {
        self.color.is_valid() && self.depth.as_ref().map_or(true, DepthImage::is_valid)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .field("width", &self.color.width)
            .field("height", &self.color.height)
            .field("has_depth", &self.depth.is_some())
            .finish()
    }
}

/// Assigns monotonically increasing sequence numbers.
///
/// Owned by the supervisor so numbering survives device reopen and session
/// reconnect. The first frame is numbered 1.
#[derive(Debug, Default)]
pub struct FrameSequencer {
    last: u64,
}

impl FrameSequencer {
    /// A sequencer whose first frame is numbered 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps a capture with the next sequence number.
    pub fn stamp(&mut self, capture: Capture) -> Frame {
        self.last += 1;
        Frame::new(self.last, capture)
    }

    /// The number the next frame will carry.
    pub fn next_sequence(&self) -> u64 {
        self.last + 1
    }

    /// The last assigned number, 0 before the first frame.
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(width: u32, height: u32) -> Capture {
        let rgb = vec![0u8; (width * height * 3) as usize];
        Capture::now(ColorImage::new(width, height, rgb), None)
    }

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(7, capture(64, 48));

        assert_eq!(frame.color().width(), 64);
        assert_eq!(frame.color().height(), 48);
        assert_eq!(frame.sequence(), 7);
        assert!(frame.depth().is_none());
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let mut cap = capture(64, 48);
        cap.color = ColorImage::new(64, 48, vec![0u8; 100]);
        assert!(!Frame::new(1, cap).is_valid());
    }

    #[test]
    fn test_invalid_depth_plane() {
        let mut cap = capture(4, 4);
        cap.depth = Some(DepthImage::new(4, 4, vec![0u16; 3]));
        assert!(!Frame::new(1, cap).is_valid());
    }

    #[test]
    fn test_z16_decoding() {
        let raw = [0x10, 0x00, 0xff, 0x01];
        let depth = DepthImage::from_z16_le(2, 1, &raw).unwrap();
        assert_eq!(depth.values(), &[16, 511]);
        assert!(DepthImage::from_z16_le(2, 2, &raw).is_none());
    }

    #[test]
    fn test_sequencer_is_monotonic() {
        let mut sequencer = FrameSequencer::new();
        assert_eq!(sequencer.next_sequence(), 1);

        let first = sequencer.stamp(capture(2, 2));
        let second = sequencer.stamp(capture(2, 2));

        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(sequencer.last(), 2);
        assert_eq!(sequencer.next_sequence(), 3);
    }
}
