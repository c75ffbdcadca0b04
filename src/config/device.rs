//! Video device identifiers and docker-style device mappings.

use super::ConfigError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A capture device, either by index or by node path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VideoDevice {
    /// Capture index; `N` corresponds to `/dev/videoN`.
    Index(u32),
    /// Explicit device node.
    Path(PathBuf),
}

impl VideoDevice {
    /// Parses a metadata value.
    ///
    /// Numeric values are capture indices, anything else is treated as a
    /// device node path.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::InvalidDevice {
                device: raw.to_string(),
                reason: "empty device identifier".to_string(),
            });
        }
        if let Ok(index) = raw.parse::<u32>() {
            return Ok(Self::Index(index));
        }
        if raw.contains("://") {
            return Err(ConfigError::InvalidDevice {
                device: raw.to_string(),
                reason: "network streams are not supported, use a device index or /dev path"
                    .to_string(),
            });
        }
        Ok(Self::Path(PathBuf::from(raw)))
    }

    /// Returns the capture index, also for `/dev/videoN` style paths.
    pub fn index(&self) -> Option<u32> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Path(path) => path
                .to_str()?
                .strip_prefix("/dev/video")
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))?
                .parse()
                .ok(),
        }
    }

    /// The device node this identifier refers to under `dev_root`.
    pub fn node_path(&self, dev_root: &Path) -> PathBuf {
        match self {
            Self::Index(index) => dev_root.join(format!("video{index}")),
            Self::Path(path) => path.clone(),
        }
    }
}

impl fmt::Display for VideoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A `--device host[:container[:permissions]]` mapping from the driver params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMapping {
    /// Node on the host.
    pub host: PathBuf,
    /// Node as seen inside the container.
    pub container: PathBuf,
}

impl DeviceMapping {
    /// Parses the value part of a `--device` flag.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split(':');
        let host = parts.next().filter(|p| !p.is_empty())?;
        let container = parts.next().filter(|p| !p.is_empty()).unwrap_or(host);
        Some(Self {
            host: PathBuf::from(host),
            container: PathBuf::from(container),
        })
    }

    /// Extracts all device mappings from a docker-style parameter list.
    ///
    /// Accepts `["--device", "a:b"]`, `["--device a:b"]` and
    /// `["--device=a:b"]` forms. Other parameters are ignored.
    pub fn from_params(params: &[String]) -> Vec<Self> {
        let tokens: Vec<&str> = params
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect();

        let mut mappings = Vec::new();
        let mut iter = tokens.iter();
        while let Some(token) = iter.next() {
            let value = if *token == "--device" {
                iter.next().copied()
            } else {
                token.strip_prefix("--device=")
            };
            if let Some(mapping) = value.and_then(Self::parse) {
                mappings.push(mapping);
            }
        }
        mappings
    }
}

/// Resolves device identifiers against the filesystem.
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    dev_root: PathBuf,
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self::new("/dev")
    }
}

impl DeviceLocator {
    /// Resolves device nodes under `dev_root`.
    pub fn new(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
        }
    }

    /// Directory device indices resolve under.
    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    /// Returns the device node, failing if it does not exist.
    pub fn resolve(&self, device: &VideoDevice) -> Result<PathBuf, ConfigError> {
        let node = device.node_path(&self.dev_root);
        if node.exists() {
            Ok(node)
        } else {
            Err(ConfigError::DeviceMissing {
                device: device.to_string(),
                path: node,
            })
        }
    }
}
