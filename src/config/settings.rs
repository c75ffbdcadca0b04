//! Driver tuning settings.
//!
//! Everything here has a sensible default so the driver runs without a
//! settings file. Operators can override capture format, recovery policy,
//! and transport timeouts through a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Capture format and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// JPEG quality for the color plane (1-100).
    pub jpeg_quality: u8,
    /// How long to wait for a single frame before declaring the device stalled.
    pub frame_timeout_ms: u64,
    /// How long to wait for the device to open.
    pub open_timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            jpeg_quality: 80,
            frame_timeout_ms: 5_000,
            open_timeout_ms: 10_000,
        }
    }
}

impl CaptureSettings {
    /// Creates settings with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the capture parameters.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(SettingsError::InvalidFrameRate);
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(SettingsError::InvalidJpegQuality);
        }
        if self.frame_timeout_ms == 0 {
            return Err(SettingsError::InvalidTimeout("capture.frame_timeout_ms"));
        }
        if self.open_timeout_ms == 0 {
            return Err(SettingsError::InvalidTimeout("capture.open_timeout_ms"));
        }
        Ok(())
    }

    /// Interval between frames at the target rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    /// `frame_timeout_ms` as a duration.
    #[inline]
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    /// `open_timeout_ms` as a duration.
    #[inline]
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Recovery policy knobs for the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Ceiling for the exponential backoff.
    pub max_backoff_ms: u64,
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
    /// Consecutive published frames that clear the failure count.
    pub reset_after_frames: u64,
    /// Random spread applied to each delay (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            max_retries: 8,
            reset_after_frames: 30,
            jitter: 0.1,
        }
    }
}

impl SupervisorSettings {
    /// Validates the recovery parameters.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.initial_backoff_ms == 0 || self.max_backoff_ms < self.initial_backoff_ms {
            return Err(SettingsError::InvalidBackoff);
        }
        if self.reset_after_frames == 0 {
            return Err(SettingsError::InvalidResetWindow);
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(SettingsError::InvalidJitter);
        }
        Ok(())
    }
}

/// Transport settings for the twin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Per-request timeout for the handshake and each frame upload.
    pub request_timeout_ms: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

impl PublishSettings {
    /// `request_timeout_ms` as a duration.
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Exporter port (0 to disable).
    pub port: u16,
}

/// Settings validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate outside 1-120.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// JPEG quality outside 1-100.
    #[error("invalid jpeg quality (must be 1-100)")]
    InvalidJpegQuality,
    /// A timeout is zero.
    #[error("{0} must be greater than zero")]
    InvalidTimeout(&'static str),
    /// Backoff start is zero or above its ceiling.
    #[error("backoff must start above zero and not exceed its ceiling")]
    InvalidBackoff,
    /// `reset_after_frames` is zero.
    #[error("reset_after_frames must be greater than zero")]
    InvalidResetWindow,
    /// Jitter outside 0.0-1.0.
    #[error("jitter must be between 0.0 and 1.0")]
    InvalidJitter,
    /// The file could not be read.
    #[error("failed to read settings file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for these settings.
    #[error("failed to parse settings file: {0}")]
    ParseError(String),
}

/// Full settings file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriverSettings {
    /// Capture device parameters.
    #[serde(default)]
    pub capture: CaptureSettings,
    /// Retry and backoff policy.
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    /// Endpoint request limits.
    #[serde(default)]
    pub publish: PublishSettings,
    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl DriverSettings {
    /// Loads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SettingsError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: DriverSettings =
            toml::from_str(content).map_err(|e| SettingsError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.capture.validate()?;
        self.supervisor.validate()?;
        if self.publish.request_timeout_ms == 0 {
            return Err(SettingsError::InvalidTimeout("publish.request_timeout_ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        assert!(DriverSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut capture = CaptureSettings::default();
        capture.width = 0;
        assert!(matches!(
            capture.validate(),
            Err(SettingsError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = DriverSettings::from_toml(
            r#"
            [capture]
            fps = 15

            [supervisor]
            max_retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.capture.fps, 15);
        assert_eq!(settings.capture.width, 640);
        assert_eq!(settings.supervisor.max_retries, 3);
        assert_eq!(settings.supervisor.initial_backoff_ms, 500);
        assert_eq!(settings.publish.request_timeout_ms, 5_000);
        assert_eq!(settings.metrics.port, 0);
    }

    #[test]
    fn test_backoff_ceiling_below_start_rejected() {
        let result = DriverSettings::from_toml(
            r#"
            [supervisor]
            initial_backoff_ms = 1000
            max_backoff_ms = 10
            "#,
        );
        assert!(matches!(result, Err(SettingsError::InvalidBackoff)));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = DriverSettings::from_toml("[capture\nwidth = ");
        assert!(matches!(result, Err(SettingsError::ParseError(_))));
    }

    #[test]
    fn test_frame_interval() {
        let capture = CaptureSettings {
            fps: 20,
            ..Default::default()
        };
        assert_eq!(capture.frame_interval(), Duration::from_millis(50));
    }
}
