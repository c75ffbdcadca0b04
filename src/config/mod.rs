//! Driver configuration.
//!
//! Configuration is assembled once at startup from the environment injected
//! by the orchestrator, the twin metadata file, and an optional settings
//! file. The resulting [`DriverConfig`] is immutable for the lifetime of the
//! process.

mod device;
mod driver;
pub mod env;
mod metadata;
mod settings;

pub use device::{DeviceLocator, DeviceMapping, VideoDevice};
pub use driver::{ApiToken, ConfigLoader, DriverConfig, DEFAULT_BASE_URL};
pub use env::Environment;
pub use metadata::{MetadataError, TwinMetadata};
pub use settings::{
    CaptureSettings, DriverSettings, MetricsSettings, PublishSettings, SettingsError,
    SupervisorSettings,
};

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors. None of these are retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
    /// An environment variable has an unusable value.
    #[error("invalid {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
    /// The twin metadata file could not be read.
    #[error("failed to read twin metadata {}: {}", path.display(), reason)]
    MetadataRead { path: PathBuf, reason: String },
    /// The twin metadata file is not valid.
    #[error("malformed twin metadata {}: {}", path.display(), source)]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },
    /// A device value is neither an index nor a device path.
    #[error("invalid video device {device:?}: {reason}")]
    InvalidDevice { device: String, reason: String },
    /// A device path does not exist.
    #[error("video device {} not present ({} does not exist)", device, path.display())]
    DeviceMissing { device: String, path: PathBuf },
    /// The settings file is invalid.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    /// This build cannot do what was asked.
    #[error("{0}")]
    Unsupported(String),
}
