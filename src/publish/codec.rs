//! Frame envelope encoding.
//!
//! # Layout
//!
//! ```text
//! +------+---------+----------------+-------------+-------------+-------------+
//! | CWFR | version | header length  | JSON header | color plane | depth plane |
//! | 4 B  | u8      | u32 big-endian | N bytes     | JPEG        | Z16 LE      |
//! +------+---------+----------------+-------------+-------------+-------------+
//! ```
//!
//! The header records each plane's encoding, dimensions and byte length so
//! the receiver can split the body without scanning it.

use crate::capture::Frame;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope magic.
pub const FRAME_MAGIC: &[u8; 4] = b"CWFR";
/// Envelope format version.
pub const FRAME_VERSION: u8 = 1;
/// Content type used when uploading an envelope.
pub const FRAME_CONTENT_TYPE: &str = "application/vnd.cyberwave.frame";

const PREAMBLE_LEN: usize = 4 + 1 + 4;

/// Errors raised while encoding or decoding an envelope.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The frame's planes do not match their dimensions.
    #[error("frame {sequence} has inconsistent plane dimensions")]
    InvalidFrame { sequence: u64 },
    /// The color plane could not be compressed.
    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
    /// The header could not be serialized.
    #[error("header serialization failed: {0}")]
    Header(#[from] serde_json::Error),
    /// The body ends before the declared lengths.
    #[error("envelope truncated")]
    Truncated,
    /// The body does not start with `CWFR`.
    #[error("not a frame envelope")]
    BadMagic,
    /// The envelope version is not 1.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
}

/// How a plane's bytes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneEncoding {
    /// Baseline JPEG.
    Jpeg,
    /// Raw little-endian 16-bit depth.
    Z16le,
}

/// Description of one plane in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneHeader {
    /// Plane encoding.
    pub encoding: PlaneEncoding,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded length in bytes.
    pub len: usize,
}

/// JSON header carried at the front of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Frame sequence number.
    pub sequence: u64,
    /// Capture timestamp.
    pub captured_at: DateTime<Utc>,
    /// Color plane layout.
    pub color: PlaneHeader,
    /// Depth plane layout, if present.
    pub depth: Option<PlaneHeader>,
}

/// A serialized frame ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    sequence: u64,
    body: Vec<u8>,
}

impl EncodedFrame {
    /// Sequence number of the encoded frame.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The full envelope.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the frame, returning the envelope bytes.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Encodes frames into envelopes.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    jpeg_quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameEncoder {
    /// An encoder with the given JPEG quality (1-100).
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Encodes `frame` into an envelope.
    pub fn encode(&self, frame: &Frame) -> Result<EncodedFrame, EncodeError> {
        if !frame.is_valid() {
            return Err(EncodeError::InvalidFrame {
                sequence: frame.sequence(),
            });
        }

        let color = frame.color();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality).encode(
            color.rgb(),
            color.width(),
            color.height(),
            ExtendedColorType::Rgb8,
        )?;

        let depth = frame.depth().map(|d| {
            let bytes: Vec<u8> = d.values().iter().flat_map(|v| v.to_le_bytes()).collect();
            (d.width(), d.height(), bytes)
        });

        let header = FrameHeader {
            sequence: frame.sequence(),
            captured_at: frame.captured_at(),
            color: PlaneHeader {
                encoding: PlaneEncoding::Jpeg,
                width: color.width(),
                height: color.height(),
                len: jpeg.len(),
            },
            depth: depth.as_ref().map(|(width, height, bytes)| PlaneHeader {
                encoding: PlaneEncoding::Z16le,
                width: *width,
                height: *height,
                len: bytes.len(),
            }),
        };
        let header_json = serde_json::to_vec(&header)?;

        let depth_len = depth.as_ref().map_or(0, |(_, _, b)| b.len());
        let mut body =
            Vec::with_capacity(PREAMBLE_LEN + header_json.len() + jpeg.len() + depth_len);
        body.extend_from_slice(FRAME_MAGIC);
        body.push(FRAME_VERSION);
        body.extend_from_slice(&(header_json.len() as u32).to_be_bytes());
        body.extend_from_slice(&header_json);
        body.extend_from_slice(&jpeg);
        if let Some((_, _, bytes)) = depth {
            body.extend_from_slice(&bytes);
        }

        Ok(EncodedFrame {
            sequence: frame.sequence(),
            body,
        })
    }
}

/// Splits an envelope into its header and plane payload.
pub fn decode_header(body: &[u8]) -> Result<(FrameHeader, &[u8]), EncodeError> {
    if body.len() < PREAMBLE_LEN {
        return Err(EncodeError::Truncated);
    }
    if &body[..4] != FRAME_MAGIC {
        return Err(EncodeError::BadMagic);
    }
    if body[4] != FRAME_VERSION {
        return Err(EncodeError::UnsupportedVersion(body[4]));
    }
    let header_len = u32::from_be_bytes([body[5], body[6], body[7], body[8]]) as usize;
    let rest = &body[PREAMBLE_LEN..];
    if rest.len() < header_len {
        return Err(EncodeError::Truncated);
    }
    let header: FrameHeader = serde_json::from_slice(&rest[..header_len])?;
    let payload = &rest[header_len..];
    let expected = header.color.len + header.depth.as_ref().map_or(0, |d| d.len);
    if payload.len() != expected {
        return Err(EncodeError::Truncated);
    }
    Ok((header, payload))
}
