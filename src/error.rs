use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::{error, warn};

use crate::backend::BackendError;
use crate::importer::ImportError;
use crate::occupancy::OccupancyError;
use crate::requests::RequestError;
use crate::session::SessionError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// The backing store refused a write; carries its message unchanged.
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Rejected { status, message } => {
                warn!(status, %message, "backend rejected request");
                ApiError::Upstream(message)
            }
            BackendError::Http(err) => {
                error!("HTTP error: {err}");
                ApiError::Upstream("Failed to reach the database".into())
            }
            BackendError::Url(err) => {
                error!("URL error: {err}");
                ApiError::Internal("Backend is misconfigured".into())
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(value: ImportError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::NotFound => ApiError::NotFound(value.to_string()),
            SessionError::InProgress => ApiError::Conflict(value.to_string()),
            SessionError::NothingToImport | SessionError::InvalidRows(_) => {
                ApiError::BadRequest(value.to_string())
            }
        }
    }
}

impl From<OccupancyError> for ApiError {
    fn from(value: OccupancyError) -> Self {
        match value {
            OccupancyError::Backend(err) => err.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::Backend(err) => err.into(),
            RequestError::EmptyMessage => ApiError::BadRequest(value.to_string()),
        }
    }
}
