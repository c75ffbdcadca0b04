//! The validated driver configuration and its loader.

use super::env::{self, Environment};
use super::metadata::{parse_flag, TwinMetadata};
use super::{ConfigError, DeviceLocator, DeviceMapping, DriverSettings, VideoDevice};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

/// Platform API used when `CYBERWAVE_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.cyberwave.com/";

const DEPTH_ASSET_KEY: &str = "intel/realsensed455";
const STANDARD_ASSET_KEY: &str = "cyberwave/standard-cam";

/// API token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Fully validated configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Whether the camera also produces depth (e.g. RealSense).
    pub is_depth_camera: bool,
    /// Color capture device.
    pub video_device: VideoDevice,
    /// Depth stream device, for depth cameras that expose one.
    pub depth_device: Option<VideoDevice>,
    /// API token for the twin endpoint.
    pub token: ApiToken,
    /// Twin to stream to.
    pub twin_uuid: Uuid,
    /// Where the twin metadata JSON was read from.
    pub twin_metadata_path: PathBuf,
    /// Base URL of the platform API, always ending in `/`.
    pub api_base_url: Url,
    /// Devices passed through to the container by the orchestrator.
    pub device_mappings: Vec<DeviceMapping>,
    /// Tuning from the settings file, or defaults.
    pub settings: DriverSettings,
}

impl DriverConfig {
    /// Asset the twin is registered under on the platform.
    pub fn asset_key(&self) -> &'static str {
        if self.is_depth_camera {
            DEPTH_ASSET_KEY
        } else {
            STANDARD_ASSET_KEY
        }
    }

    /// One-line description for startup logs and `--check-config`.
    pub fn summary(&self) -> String {
        let depth = self
            .depth_device
            .as_ref()
            .map(|d| format!(", depth_device={d}"))
            .unwrap_or_default();
        format!(
            "twin={} asset={} device={}{} endpoint={}",
            self.twin_uuid,
            self.asset_key(),
            self.video_device,
            depth,
            self.api_base_url
        )
    }
}

/// Builds a [`DriverConfig`] from an environment snapshot.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env: Environment,
    locator: DeviceLocator,
    settings_path: Option<PathBuf>,
    verify_devices: bool,
}

impl ConfigLoader {
    /// Loader over the current process environment.
    pub fn from_process_env() -> Self {
        Self::new(Environment::capture())
    }

    /// A loader reading from `env`.
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            locator: DeviceLocator::default(),
            settings_path: None,
            verify_devices: true,
        }
    }

    /// Resolves capture indices under `dev_root` instead of `/dev`.
    pub fn with_dev_root(mut self, dev_root: impl Into<PathBuf>) -> Self {
        self.locator = DeviceLocator::new(dev_root);
        self
    }

    /// Settings file taking precedence over `CYBERWAVE_DRIVER_SETTINGS`.
    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        self.settings_path = path;
        self
    }

    /// Skips the device node existence check (synthetic camera runs).
    pub fn verify_devices(mut self, verify: bool) -> Self {
        self.verify_devices = verify;
        self
    }

    /// Loads and validates the configuration.
    ///
    /// Metadata is fully parsed before any device node is touched.
    pub fn load(&self) -> Result<DriverConfig, ConfigError> {
        let token = self
            .env
            .first_of(&[env::TOKEN, env::LEGACY_TOKEN])
            .ok_or(ConfigError::MissingVar(env::TOKEN))?;
        let twin_uuid = parse_uuid(self.env.require(env::TWIN_UUID)?)?;
        let twin_metadata_path = PathBuf::from(self.env.require(env::TWIN_JSON_FILE)?);

        let metadata = read_metadata(&twin_metadata_path)?;
        let device_mappings = DeviceMapping::from_params(&metadata.driver_params);

        let is_depth_camera = match self.env.get(env::METADATA_IS_DEPTH_CAMERA) {
            Some(raw) => parse_flag("is_depth_camera", raw).map_err(|e| ConfigError::InvalidVar {
                name: env::METADATA_IS_DEPTH_CAMERA,
                reason: e.to_string(),
            })?,
            None => metadata.is_depth_camera.unwrap_or(false),
        };

        let video_device = match self
            .env
            .get(env::METADATA_VIDEO_DEVICE)
            .or(metadata.video_device.as_deref())
        {
            Some(raw) => VideoDevice::parse(raw)?,
            None => device_mappings
                .first()
                .map(|m| VideoDevice::Path(m.container.clone()))
                .unwrap_or(VideoDevice::Index(0)),
        };

        let depth_device = self
            .env
            .get(env::METADATA_DEPTH_DEVICE)
            .or(metadata.depth_device.as_deref())
            .map(VideoDevice::parse)
            .transpose()?;

        let settings = match self
            .settings_path
            .clone()
            .or_else(|| self.env.get(env::DRIVER_SETTINGS).map(PathBuf::from))
        {
            Some(path) => DriverSettings::from_file(path)?,
            None => DriverSettings::default(),
        };

        let api_base_url = parse_base_url(self.env.get(env::BASE_URL).unwrap_or(DEFAULT_BASE_URL))?;

        if self.verify_devices {
            self.locator.resolve(&video_device)?;
            if let Some(depth) = &depth_device {
                self.locator.resolve(depth)?;
            }
        }

        let config = DriverConfig {
            is_depth_camera,
            video_device,
            depth_device,
            token: ApiToken::new(token),
            twin_uuid,
            twin_metadata_path,
            api_base_url,
            device_mappings,
            settings,
        };
        tracing::debug!(config = %config.summary(), "Configuration loaded");
        Ok(config)
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(raw).map_err(|e| ConfigError::InvalidVar {
        name: env::TWIN_UUID,
        reason: e.to_string(),
    })
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidVar {
        name: env::BASE_URL,
        reason,
    };
    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    // Relative joins replace the last segment unless the path ends in '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn read_metadata(path: &Path) -> Result<TwinMetadata, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::MetadataRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    TwinMetadata::parse(&text).map_err(|source| ConfigError::MalformedMetadata {
        path: path.to_path_buf(),
        source,
    })
}
