//! HTTP transport for the twin streaming endpoint.
//!
//! A session is opened with an authenticated `POST` to the twin's
//! `stream/sessions` collection; each frame is then uploaded as one
//! envelope to `stream/sessions/{id}/frames`. Closing the session issues a
//! best-effort `DELETE`.

use super::codec::{EncodedFrame, FRAME_CONTENT_TYPE};
use super::session::{PublishError, SessionConnector, StreamSession};
use crate::config::{ApiToken, DriverConfig};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Header carrying the frame sequence number alongside the envelope.
pub const SEQUENCE_HEADER: &str = "X-Frame-Sequence";

const SOURCE_TYPE: &str = "edge";
const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Serialize)]
struct OpenSessionRequest<'a> {
    client_session_id: Uuid,
    asset_key: &'a str,
    source_type: &'a str,
    is_depth_camera: bool,
    device: &'a str,
    resume_sequence: u64,
}

#[derive(Debug, Deserialize)]
struct OpenSessionResponse {
    session_id: String,
}

/// Which resource a request addressed. Decides what a 404 means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The twin's `stream/sessions` collection.
    Twin,
    /// One session or its `frames` sub-resource.
    Session,
}

/// Maps an HTTP status to the publish error taxonomy.
///
/// A 404 on the session collection means the twin does not exist; on a
/// session URL it means the endpoint dropped the session, which a new
/// session fixes.
pub fn classify_status(
    endpoint: &str,
    scope: Scope,
    status: u16,
    detail: &str,
) -> Result<(), PublishError> {
    let endpoint = endpoint.to_string();
    match (status, scope) {
        (200..=299, _) => Ok(()),
        (401 | 403, _) => Err(PublishError::AuthRejected { endpoint, status }),
        (404, Scope::Twin) => Err(PublishError::TwinNotFound { endpoint }),
        (404, Scope::Session) => Err(PublishError::SessionExpired { endpoint }),
        (408 | 429 | 500..=599, _) => Err(PublishError::Unavailable { endpoint, status }),
        _ => Err(PublishError::Rejected {
            endpoint,
            status,
            detail: detail.chars().take(MAX_DETAIL_LEN).collect(),
        }),
    }
}

fn check_status(
    endpoint: &str,
    scope: Scope,
    response: Response,
) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().unwrap_or_default();
    classify_status(endpoint, scope, status.as_u16(), &detail)?;
    Err(PublishError::Protocol {
        endpoint: endpoint.to_string(),
        reason: format!("unexpected status {status}"),
    })
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        PublishError::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

fn push_segment(url: &Url, segment: &str) -> Result<Url, PublishError> {
    let endpoint = url.to_string();
    let mut url = url.clone();
    url.path_segments_mut()
        .map_err(|_| PublishError::Protocol {
            endpoint,
            reason: "endpoint URL cannot carry a path".to_string(),
        })?
        .push(segment);
    Ok(url)
}

/// `{base}api/v1/twins/{twin}/stream/sessions`
pub fn sessions_url(base: &Url, twin_uuid: Uuid) -> Result<Url, PublishError> {
    base.join(&format!("api/v1/twins/{twin_uuid}/stream/sessions"))
        .map_err(|e| PublishError::Protocol {
            endpoint: base.to_string(),
            reason: e.to_string(),
        })
}

/// Opens [`HttpSession`]s for one twin.
#[derive(Debug)]
pub struct HttpConnector {
    client: Client,
    sessions_url: Url,
    token: ApiToken,
    asset_key: &'static str,
    is_depth_camera: bool,
    device: String,
}

impl HttpConnector {
    /// Builds the HTTP client for the configured twin.
    pub fn new(config: &DriverConfig) -> Result<Self, PublishError> {
        let sessions_url = sessions_url(&config.api_base_url, config.twin_uuid)?;
        let client = Client::builder()
            .timeout(config.settings.publish.request_timeout())
            .connect_timeout(config.settings.publish.request_timeout())
            .user_agent(concat!("cyberwave-camera-driver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(sessions_url.as_str(), e))?;

        Ok(Self {
            client,
            sessions_url,
            token: config.token.clone(),
            asset_key: config.asset_key(),
            is_depth_camera: config.is_depth_camera,
            device: config.video_device.to_string(),
        })
    }

    /// The twin's session collection.
    pub fn sessions_url(&self) -> &Url {
        &self.sessions_url
    }
}

impl SessionConnector for HttpConnector {
    type Session = HttpSession;

    fn connect(&self, resume_sequence: u64) -> Result<HttpSession, PublishError> {
        let endpoint = self.sessions_url.as_str();
        let request = OpenSessionRequest {
            client_session_id: Uuid::new_v4(),
            asset_key: self.asset_key,
            source_type: SOURCE_TYPE,
            is_depth_camera: self.is_depth_camera,
            device: &self.device,
            resume_sequence,
        };

        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(self.token.expose())
            .json(&request)
            .send()
            .map_err(|e| transport_error(endpoint, e))?;
        let opened: OpenSessionResponse = check_status(endpoint, Scope::Twin, response)?
            .json()
            .map_err(|e| PublishError::Protocol {
                endpoint: endpoint.to_string(),
                reason: format!("invalid session response: {e}"),
            })?;

        let session_url = push_segment(&self.sessions_url, &opened.session_id)?;
        let frames_url = push_segment(&session_url, "frames")?;

        tracing::info!(
            session = %opened.session_id,
            resume_sequence,
            "Stream session opened"
        );

        Ok(HttpSession {
            client: self.client.clone(),
            token: self.token.clone(),
            id: opened.session_id,
            session_url,
            frames_url,
            closed: false,
        })
    }
}

/// One open upload session.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    token: ApiToken,
    id: String,
    session_url: Url,
    frames_url: Url,
    closed: bool,
}

impl HttpSession {
    /// Where frames of this session are uploaded.
    pub fn frames_url(&self) -> &Url {
        &self.frames_url
    }
}

impl StreamSession for HttpSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&mut self, frame: EncodedFrame) -> Result<(), PublishError> {
        let endpoint = self.frames_url.as_str();
        let sequence = frame.sequence();
        let response = self
            .client
            .post(self.frames_url.clone())
            .bearer_auth(self.token.expose())
            .header(CONTENT_TYPE, FRAME_CONTENT_TYPE)
            .header(SEQUENCE_HEADER, sequence.to_string())
            .body(frame.into_body())
            .send()
            .map_err(|e| transport_error(endpoint, e))?;
        check_status(endpoint, Scope::Session, response)?;
        tracing::trace!(session = %self.id, sequence, "Frame uploaded");
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self
            .client
            .delete(self.session_url.clone())
            .bearer_auth(self.token.expose())
            .send()
        {
            Ok(response) if response.status().is_success() || response.status() == 404 => {
                tracing::info!(session = %self.id, "Stream session closed");
            }
            Ok(response) => {
                tracing::warn!(session = %self.id, status = %response.status(), "Session close rejected");
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Session close failed");
            }
        }
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.close();
    }
}
