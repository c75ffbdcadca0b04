//! Stream session abstraction.
//!
//! A session is one authenticated connection to the twin endpoint. The
//! supervisor owns at most one at a time and replaces it after transport
//! failures; sessions never reconnect on their own.

use super::codec::{EncodeError, EncodedFrame};
use thiserror::Error;

/// Errors raised while talking to the twin endpoint.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The connection could not be established or broke mid-request.
    #[error("cannot reach {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },
    /// No response within the request timeout.
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    /// The endpoint answered 408, 429 or 5xx.
    #[error("{endpoint} is unavailable (HTTP {status})")]
    Unavailable { endpoint: String, status: u16 },
    /// The response did not match the wire protocol.
    #[error("unexpected response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },
    /// The token was refused (401/403).
    #[error("{endpoint} rejected the token (HTTP {status})")]
    AuthRejected { endpoint: String, status: u16 },
    /// The twin's session collection does not exist.
    #[error("twin not found at {endpoint}")]
    TwinNotFound { endpoint: String },
    /// The endpoint no longer knows the current session.
    #[error("session at {endpoint} has expired")]
    SessionExpired { endpoint: String },
    /// Any other 4xx answer.
    #[error("{endpoint} rejected the request (HTTP {status}): {detail}")]
    Rejected {
        endpoint: String,
        status: u16,
        detail: String,
    },
    /// The frame could not be turned into an envelope.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] EncodeError),
}

impl PublishError {
    /// Whether retrying cannot help (revoked token, unknown twin, bad request).
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::AuthRejected { .. } | Self::TwinNotFound { .. } | Self::Rejected { .. }
        )
    }

    /// Whether the failure concerns only the current frame.
    ///
    /// Such frames are dropped while the session stays up.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Encode(_))
    }
}

/// An open, authenticated connection to the twin endpoint.
pub trait StreamSession {
    /// Identifier assigned by the endpoint.
    fn id(&self) -> &str;

    /// Uploads one frame. Blocks until acknowledged or failed.
    fn send(&mut self, frame: EncodedFrame) -> Result<(), PublishError>;

    /// Releases the session. Best-effort and idempotent.
    fn close(&mut self);
}

/// Opens new sessions.
pub trait SessionConnector {
    /// Session type produced by [`SessionConnector::connect`].
    type Session: StreamSession;

    /// Opens a session that continues numbering at `resume_sequence`.
    fn connect(&self, resume_sequence: u64) -> Result<Self::Session, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> String {
        "https://api.example.com".to_string()
    }

    #[test]
    fn test_auth_rejection_is_permanent() {
        let err = PublishError::AuthRejected {
            endpoint: endpoint(),
            status: 401,
        };
        assert!(err.is_permanent());
        assert!(!err.is_frame_local());
    }

    #[test]
    fn test_network_failures_are_transient() {
        let errors = [
            PublishError::Timeout {
                endpoint: endpoint(),
            },
            PublishError::Transport {
                endpoint: endpoint(),
                reason: "connection refused".to_string(),
            },
            PublishError::Unavailable {
                endpoint: endpoint(),
                status: 503,
            },
            PublishError::SessionExpired {
                endpoint: endpoint(),
            },
        ];
        assert!(errors.iter().all(|e| !e.is_permanent()));
    }

    #[test]
    fn test_encode_failure_is_frame_local() {
        let err = PublishError::from(EncodeError::InvalidFrame { sequence: 3 });
        assert!(err.is_frame_local());
        assert!(!err.is_permanent());
    }
}
