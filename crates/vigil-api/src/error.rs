use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use vigil_engine::EngineError;

/// Errors returned over the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ProductNotFound(_)
            | EngineError::EngagementNotFound(_)
            | EngineError::TestNotFound(_)
            | EngineError::FindingNotFound(_) => ApiError::NotFound(err.to_string()),
            EngineError::DuplicateProduct(_) => ApiError::Conflict(err.to_string()),
            EngineError::ScanTypeMismatch { .. }
            | EngineError::DuplicateOfSelf(_)
            | EngineError::Parser(_)
            | EngineError::Model(_) => ApiError::InvalidRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
