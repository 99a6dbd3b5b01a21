use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{auth::AuthError, models::ErrorBody, repository::StoreError};

/// ApiError
///
/// The single error taxonomy every handler returns. Each variant maps to exactly one
/// HTTP status; the response body is always `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 400: bad id, bad query parameter, bad body or a failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// 401: missing, malformed, invalid or expired credential.
    #[error("{0}")]
    Unauthorized(String),

    /// 403: authenticated, but the role does not allow the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// 409: natural key or username already taken.
    #[error("{0}")]
    Conflict(String),

    /// 500: the store could not be reached. The detail is logged and never sent to the
    /// caller.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// 500: token signing, password hashing or a blocking task failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, ApiError::StoreUnavailable(_) | ApiError::Internal(_)) {
            tracing::error!("{}", self);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(detail) => ApiError::StoreUnavailable(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingOrMalformed | AuthError::InvalidOrExpired => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::Forbidden => ApiError::Forbidden(err.to_string()),
            AuthError::Signing(detail) => ApiError::Internal(detail),
        }
    }
}
