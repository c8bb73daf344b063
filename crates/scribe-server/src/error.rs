//! HTTP error mapping.
//!
//! Every [`DriveError`] kind maps to one stable status code, so the
//! frontend can branch on status instead of parsing messages.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use scribe_drive::{DriveError, ErrorKind};

/// Wrapper that turns a [`DriveError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(DriveError);

impl From<DriveError> for ApiError {
    fn from(err: DriveError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.message() }))).into_response()
    }
}

/// Returns the status code for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::InvalidGrant => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized | ErrorKind::ReauthenticationRequired => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::StorageUnavailable
        | ErrorKind::Network
        | ErrorKind::RateLimited
        | ErrorKind::Server => StatusCode::BAD_GATEWAY,
        ErrorKind::InvalidResponse | ErrorKind::Configuration | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_stable_status_codes() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InvalidGrant), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(ErrorKind::ReauthenticationRequired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::StorageUnavailable),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(ErrorKind::RateLimited), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_carries_message() {
        let response = ApiError(DriveError::not_found("project \"Ghost\" not found"))
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
