//! Snapshot of the process environment.
//!
//! The orchestrator injects everything the driver needs through environment
//! variables. They are captured once at startup so the rest of the crate
//! never reaches for `std::env` directly.

use super::ConfigError;
use std::collections::HashMap;

/// API token (current name).
pub const TOKEN: &str = "CYBERWAVE_TOKEN";
/// API token (name used by older edge-core releases).
pub const LEGACY_TOKEN: &str = "CYBERWAVE_API_KEY";
/// UUID of the twin to stream to.
pub const TWIN_UUID: &str = "CYBERWAVE_TWIN_UUID";
/// Path to the twin JSON metadata file.
pub const TWIN_JSON_FILE: &str = "CYBERWAVE_TWIN_JSON_FILE";
/// Platform API base URL.
pub const BASE_URL: &str = "CYBERWAVE_BASE_URL";
/// Optional TOML settings file.
pub const DRIVER_SETTINGS: &str = "CYBERWAVE_DRIVER_SETTINGS";

/// Metadata values expanded from the twin JSON by the container entrypoint.
pub const METADATA_IS_DEPTH_CAMERA: &str = "CYBERWAVE_METADATA_IS_DEPTH_CAMERA";
/// Overrides `video_device` from the twin JSON.
pub const METADATA_VIDEO_DEVICE: &str = "CYBERWAVE_METADATA_VIDEO_DEVICE";
/// Overrides `depth_device` from the twin JSON.
pub const METADATA_DEPTH_DEVICE: &str = "CYBERWAVE_METADATA_DEPTH_DEVICE";

/// Immutable set of environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Returns a trimmed, non-empty value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the first non-empty value among `names`.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Returns a value or a [`ConfigError::MissingVar`].
    pub fn require(&self, name: &'static str) -> Result<&str, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingVar(name))
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
