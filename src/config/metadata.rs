//! Twin metadata JSON.
//!
//! The orchestrator writes the twin description to disk and passes its path
//! in `CYBERWAVE_TWIN_JSON_FILE`. Camera fields may sit at the top level or
//! inside a nested `metadata` object; the nested value wins.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while interpreting the metadata document.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The file is not JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The document root is not an object.
    #[error("document root must be a JSON object")]
    NotAnObject,
    /// A nested `metadata` field is not an object.
    #[error("`metadata` must be a JSON object")]
    MetadataNotAnObject,
    /// A known field has the wrong type.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Camera-relevant fields of the twin metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwinMetadata {
    /// Whether the camera also streams depth.
    pub is_depth_camera: Option<bool>,
    /// Color device, as an index or a path.
    pub video_device: Option<String>,
    /// Depth device, as an index or a path.
    pub depth_device: Option<String>,
    /// Contents of `drivers.default.params`.
    pub driver_params: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    is_depth_camera: Option<Flag>,
    #[serde(default)]
    video_device: Option<DeviceField>,
    #[serde(default)]
    depth_device: Option<DeviceField>,
    #[serde(default)]
    drivers: Option<RawDrivers>,
}

#[derive(Debug, Deserialize)]
struct RawDrivers {
    #[serde(default)]
    default: Option<RawDriver>,
}

#[derive(Debug, Deserialize)]
struct RawDriver {
    #[serde(default)]
    params: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeviceField {
    Text(String),
    Index(u32),
}

impl DeviceField {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Index(index) => index.to_string(),
        }
    }
}

/// Parses a boolean flag written as `true`/`false` in any letter case.
pub fn parse_flag(field: &'static str, raw: &str) -> Result<bool, MetadataError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(MetadataError::InvalidField {
            field,
            reason: format!("expected true or false, got {other:?}"),
        }),
    }
}

impl TwinMetadata {
    /// Parses the metadata document.
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let root: Value = serde_json::from_str(text)?;
        if !root.is_object() {
            return Err(MetadataError::NotAnObject);
        }

        let top = RawMetadata::deserialize(&root)?;
        let nested = match root.get("metadata") {
            None | Some(Value::Null) => RawMetadata::default(),
            Some(value @ Value::Object(_)) => RawMetadata::deserialize(value)?,
            Some(_) => return Err(MetadataError::MetadataNotAnObject),
        };

        let is_depth_camera = match nested.is_depth_camera.or(top.is_depth_camera) {
            Some(Flag::Bool(flag)) => Some(flag),
            Some(Flag::Text(text)) => Some(parse_flag("is_depth_camera", &text)?),
            None => None,
        };

        let driver_params = nested
            .drivers
            .or(top.drivers)
            .and_then(|d| d.default)
            .map(|d| d.params)
            .unwrap_or_default();

        Ok(Self {
            is_depth_camera,
            video_device: nested
                .video_device
                .or(top.video_device)
                .map(DeviceField::into_string),
            depth_device: nested
                .depth_device
                .or(top.depth_device)
                .map(DeviceField::into_string),
            driver_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_document() {
        let meta =
            TwinMetadata::parse(r#"{"is_depth_camera": true, "video_device": "/dev/video2"}"#)
                .unwrap();
        assert_eq!(meta.is_depth_camera, Some(true));
        assert_eq!(meta.video_device.as_deref(), Some("/dev/video2"));
        assert!(meta.driver_params.is_empty());
    }

    #[test]
    fn test_nested_metadata_wins() {
        let meta = TwinMetadata::parse(
            r#"{
                "uuid": "b7a4c8a2-0a7e-4c55-8a43-2f2b8e5f7d11",
                "video_device": "1",
                "metadata": {
                    "is_depth_camera": "TRUE",
                    "video_device": 4,
                    "drivers": {"default": {"params": ["--device /dev/video4:/dev/video4"]}}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(meta.is_depth_camera, Some(true));
        assert_eq!(meta.video_device.as_deref(), Some("4"));
        assert_eq!(meta.driver_params, vec!["--device /dev/video4:/dev/video4"]);
    }

    #[test]
    fn test_absent_fields_are_none() {
        let meta = TwinMetadata::parse("{}").unwrap();
        assert_eq!(meta, TwinMetadata::default());
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(matches!(
            TwinMetadata::parse("{not json"),
            Err(MetadataError::Json(_))
        ));
        assert!(matches!(
            TwinMetadata::parse("[1, 2]"),
            Err(MetadataError::NotAnObject)
        ));
        assert!(matches!(
            TwinMetadata::parse(r#"{"metadata": "camera"}"#),
            Err(MetadataError::MetadataNotAnObject)
        ));
        assert!(matches!(
            TwinMetadata::parse(r#"{"is_depth_camera": "maybe"}"#),
            Err(MetadataError::InvalidField { .. })
        ));
        assert!(TwinMetadata::parse(r#"{"drivers": {"default": {"params": "--device x"}}}"#).is_err());
        assert!(TwinMetadata::parse(r#"{"video_device": [0]}"#).is_err());
    }
}
