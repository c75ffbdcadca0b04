//! Frame publishing to the digital twin.
//!
//! Frames are serialized by [`FrameEncoder`] into a self-describing
//! envelope and uploaded through a [`StreamSession`]. The HTTP transport in
//! [`http`] is the production implementation; the supervisor only depends
//! on the [`SessionConnector`] and [`StreamSession`] traits.

pub mod codec;
pub mod http;
mod session;

pub use codec::{
    decode_header, EncodeError, EncodedFrame, FrameEncoder, FrameHeader, PlaneEncoding,
    PlaneHeader, FRAME_CONTENT_TYPE,
};
pub use http::{HttpConnector, HttpSession};
pub use session::{PublishError, SessionConnector, StreamSession};

use crate::capture::Frame;

/// Encodes frames and hands them to a session.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    encoder: FrameEncoder,
}

impl Publisher {
    /// A publisher encoding with `encoder`.
    pub fn new(encoder: FrameEncoder) -> Self {
        Self { encoder }
    }

    /// Publishes one frame, returning the number of bytes uploaded.
    ///
    /// Encoding failures surface as [`PublishError::Encode`] without
    /// touching the session.
    pub fn publish<S: StreamSession>(
        &self,
        session: &mut S,
        frame: &Frame,
    ) -> Result<usize, PublishError> {
        let encoded = self.encoder.encode(frame)?;
        let bytes = encoded.body().len();
        session.send(encoded)?;
        Ok(bytes)
    }
}
