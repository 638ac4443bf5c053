use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    media::UploadError,
    repository::StoreError,
    session::AuthError,
    workflow::WorkflowError,
};

/// AppError
///
/// Everything a handler can fail with, grouped by how the user should see it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input; rejected before any I/O.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    /// Network, storage or database failure on a write path.
    #[error("{0}")]
    Store(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unprocessable(_) => "UNPROCESSABLE_ENTITY",
            AppError::Store(_) => "STORE_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }
        let body = json!({
            "error": true,
            "message": self.to_string(),
            "code": self.error_code(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::UnsupportedType { .. } | UploadError::TooLarge { .. } => {
                AppError::Validation(e.to_string())
            }
            UploadError::CompressionFailed(_) => AppError::Unprocessable(e.to_string()),
            UploadError::StoreConflict(_) => AppError::Conflict(e.to_string()),
            UploadError::Store(_) => AppError::Store(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidUsername => AppError::Validation(e.to_string()),
            AuthError::InvalidCredentials => AppError::Auth(e.to_string()),
            AuthError::Provider(_) => AppError::Store(e.to_string()),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Busy => AppError::Conflict(e.to_string()),
            WorkflowError::Validation(msg) => AppError::Validation(msg),
            WorkflowError::NotFound(what) => AppError::NotFound(what),
            WorkflowError::Upload(inner) => inner.into(),
            WorkflowError::Store(inner) => inner.into(),
        }
    }
}
