use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::capture::CaptureError;
use crate::control::Denied;
use crate::member::RegistryError;
use crate::room::RoomError;

/// Structured error type for all API handlers.
///
/// Each variant maps to an HTTP status code, a machine-readable code string,
/// and a human-readable message. Implements [`IntoResponse`] so handlers can
/// return `Result<T, ApiError>` directly.
#[derive(Debug)]
pub enum ApiError {
    /// 401 - No member identity provided.
    MemberRequired,
    /// 404 - The acting or targeted member does not exist.
    MemberNotFound(String),
    /// 409 - Member id already exists.
    MemberConflict(String),
    /// 403 - The member lacks the capability the action requires.
    MissingCapability(String),
    /// 403 - The action requires the host seat and the member is not host.
    NotHost,
    /// 409 - Another member holds the host seat.
    ControlBusy(String),
    /// 503 - Capture was disabled at startup.
    CaptureDisabled,
    /// 504 - No first frame within the start timeout.
    CaptureTimeout,
    /// 502 - The capture pipeline failed or closed before producing a frame.
    CaptureFailed(String),
    /// 500 - A source is running but no frame is cached.
    NoFrame,
    /// 400 - Malformed or invalid request.
    InvalidRequest(String),
    /// 500 - Catch-all internal error.
    InternalError(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MemberRequired => StatusCode::UNAUTHORIZED,
            ApiError::MemberNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MemberConflict(_) => StatusCode::CONFLICT,
            ApiError::MissingCapability(_) => StatusCode::FORBIDDEN,
            ApiError::NotHost => StatusCode::FORBIDDEN,
            ApiError::ControlBusy(_) => StatusCode::CONFLICT,
            ApiError::CaptureDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::CaptureTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::CaptureFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::NoFrame => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MemberRequired => "member_required",
            ApiError::MemberNotFound(_) => "member_not_found",
            ApiError::MemberConflict(_) => "member_conflict",
            ApiError::MissingCapability(_) => "missing_capability",
            ApiError::NotHost => "not_host",
            ApiError::ControlBusy(_) => "control_busy",
            ApiError::CaptureDisabled => "capture_disabled",
            ApiError::CaptureTimeout => "capture_timeout",
            ApiError::CaptureFailed(_) => "capture_failed",
            ApiError::NoFrame => "no_frame",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// Returns a human-readable error message.
    pub fn message(&self) -> String {
        match self {
            ApiError::MemberRequired => {
                "Member identity required. Provide an id via the X-Member-Id header.".to_string()
            }
            ApiError::MemberNotFound(id) => format!("Member not found: {}.", id),
            ApiError::MemberConflict(id) => format!("Member id already exists: {}.", id),
            ApiError::MissingCapability(cap) => {
                format!("Missing capability: {}.", cap)
            }
            ApiError::NotHost => "Not the current host.".to_string(),
            ApiError::ControlBusy(host) => format!("Control is held by {}.", host),
            ApiError::CaptureDisabled => "Capture is not enabled on this server.".to_string(),
            ApiError::CaptureTimeout => {
                "Capture pipeline produced no frame within the start timeout.".to_string()
            }
            ApiError::CaptureFailed(detail) => format!("Capture pipeline failed: {}.", detail),
            ApiError::NoFrame => "No frame available.".to_string(),
            ApiError::InvalidRequest(detail) => format!("Invalid request: {}.", detail),
            ApiError::InternalError(detail) => format!("Internal error: {}.", detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::UnknownMember(id) => ApiError::MemberNotFound(id),
            RoomError::Denied(Denied::MissingCapability(cap)) => {
                ApiError::MissingCapability(cap.to_string())
            }
            RoomError::Denied(Denied::NotHost) => ApiError::NotHost,
            RoomError::ControlBusy { host } => ApiError::ControlBusy(host),
            RoomError::Capture(e) => e.into(),
            RoomError::Clipboard(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<CaptureError> for ApiError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::NotEnabled => ApiError::CaptureDisabled,
            CaptureError::StartTimeout => ApiError::CaptureTimeout,
            CaptureError::NoFrameYet => ApiError::NoFrame,
            // AlreadyRunning never escapes the manager; treat it like any
            // other pipeline failure if it somehow does.
            e @ (CaptureError::AlreadyRunning
            | CaptureError::SourceClosed
            | CaptureError::Source(_)) => ApiError::CaptureFailed(e.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::IdExists(id) => ApiError::MemberConflict(id),
            RegistryError::NotFound(id) => ApiError::MemberNotFound(id),
            RegistryError::InvalidId(detail) => ApiError::InvalidRequest(detail),
            RegistryError::EmptyName => {
                ApiError::InvalidRequest("member name must not be empty".into())
            }
        }
    }
}
