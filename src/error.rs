//! Top-level driver error and process exit mapping.

use crate::capture::DeviceError;
use crate::config::ConfigError;
use crate::publish::PublishError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Process exit codes (sysexits.h).
pub mod exit {
    /// Stopped on request.
    pub const OK: u8 = 0;
    /// EX_UNAVAILABLE: device never came back.
    pub const DEVICE_UNAVAILABLE: u8 = 69;
    /// EX_SOFTWARE
    pub const INTERNAL: u8 = 70;
    /// EX_TEMPFAIL: streaming kept failing.
    pub const STREAMING_FAILED: u8 = 75;
    /// EX_PROTOCOL: the endpoint refused our requests.
    pub const REJECTED: u8 = 76;
    /// EX_NOPERM
    pub const AUTH_REJECTED: u8 = 77;
    /// EX_CONFIG
    pub const CONFIG: u8 = 78;
}

/// Fatal outcome of a driver run.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The device failed more often than the retry budget allows.
    #[error("capture device unavailable after {attempts} attempts: {source}")]
    DeviceExhausted {
        attempts: u32,
        #[source]
        source: DeviceError,
    },
    /// The endpoint failed more often than the retry budget allows.
    #[error("streaming failed after {attempts} attempts: {source}")]
    PublishExhausted {
        attempts: u32,
        #[source]
        source: PublishError,
    },
    /// The endpoint refused a request permanently.
    #[error("{0}")]
    Rejected(PublishError),
    /// A bug or an unrecoverable runtime failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => exit::CONFIG,
            Self::DeviceExhausted { .. } => exit::DEVICE_UNAVAILABLE,
            Self::PublishExhausted { .. } => exit::STREAMING_FAILED,
            Self::Rejected(PublishError::AuthRejected { .. }) => exit::AUTH_REJECTED,
            // An unknown twin is a deployment mistake, not a network fault.
            Self::Rejected(PublishError::TwinNotFound { .. }) => exit::CONFIG,
            Self::Rejected(_) => exit::REJECTED,
            Self::Internal(_) => exit::INTERNAL,
        }
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::DeviceExhausted { .. } => "device_unavailable",
            Self::PublishExhausted { .. } => "streaming_failed",
            Self::Rejected(PublishError::AuthRejected { .. }) => "auth_rejected",
            Self::Rejected(PublishError::TwinNotFound { .. }) => "twin_not_found",
            Self::Rejected(_) => "rejected",
            Self::Internal(_) => "internal",
        }
    }

    /// Builds the stderr diagnostic for this error.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            exit_code: self.exit_code(),
            message: self.to_string(),
            at: Utc::now(),
        }
    }
}

/// One-line JSON record written to stderr on fatal exit.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable machine-readable error class.
    pub kind: &'static str,
    /// Exit code the process ends with.
    pub exit_code: u8,
    /// Human-readable description.
    pub message: String,
    /// When the error was reported.
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    /// Serializes the diagnostic as one JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> String {
        "https://api.cyberwave.com/api/v1/twins/x/stream/sessions".to_string()
    }

    #[test]
    fn test_exit_codes() {
        let config = DriverError::from(ConfigError::MissingVar("CYBERWAVE_TOKEN"));
        assert_eq!(config.exit_code(), 78);

        let auth = DriverError::Rejected(PublishError::AuthRejected {
            endpoint: endpoint(),
            status: 401,
        });
        assert_eq!(auth.exit_code(), 77);

        let device = DriverError::DeviceExhausted {
            attempts: 8,
            source: DeviceError::Disconnected("/dev/video0".to_string()),
        };
        assert_eq!(device.exit_code(), 69);

        let stream = DriverError::PublishExhausted {
            attempts: 8,
            source: PublishError::Timeout {
                endpoint: endpoint(),
            },
        };
        assert_eq!(stream.exit_code(), 75);

        let missing = DriverError::Rejected(PublishError::TwinNotFound {
            endpoint: endpoint(),
        });
        assert_eq!(missing.exit_code(), 78);

        assert_eq!(DriverError::Internal("boom".into()).exit_code(), 70);
    }

    #[test]
    fn test_diagnostic_json() {
        let err = DriverError::Rejected(PublishError::AuthRejected {
            endpoint: endpoint(),
            status: 403,
        });
        let json = err.diagnostic().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["kind"], "auth_rejected");
        assert_eq!(value["exit_code"], 77);
        assert!(value["message"].as_str().unwrap().contains("HTTP 403"));
        assert!(value["at"].is_string());
    }
}
