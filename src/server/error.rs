//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::validator::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("no model dialog is open")]
    NoDialog,

    /// The user's key failed validation. Carries the canned message only.
    #[error(transparent)]
    KeyRejected(#[from] ValidationError),

    #[error("refresh unavailable: {0}")]
    RefreshUnavailable(&'static str),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) | ApiError::ModelNotFound(_) | ApiError::NoDialog => {
                StatusCode::NOT_FOUND
            }
            ApiError::KeyRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RefreshUnavailable(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
