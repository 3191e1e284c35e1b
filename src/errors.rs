use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::workflow::{GuardViolation, TransitionError};

pub type AppResult<T> = Result<T, AppError>;

/// Message returned for every authorization denial. The failed role/scope
/// combination only goes to the logs.
pub const NOT_PERMITTED: &str = "not permitted";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: not permitted")]
    Forbidden,
    #[error("invalid transition: {0}")]
    InvalidTransition(GuardViolation),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden
    }

    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::InvalidReference(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<TransitionError> for AppError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::Denied => AppError::Forbidden,
            TransitionError::Guard(violation) => AppError::InvalidTransition(violation),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (error, message) = match &self {
            AppError::Unauthorized(_) => ("unauthorized", self.to_string()),
            AppError::Forbidden => ("forbidden", NOT_PERMITTED.to_string()),
            // validation failures name the violated precondition verbatim
            AppError::InvalidTransition(violation) => ("invalid_transition", violation.to_string()),
            AppError::InvalidReference(_) => ("invalid_reference", self.to_string()),
            AppError::NotFound(_) => ("not_found", self.to_string()),
            AppError::Conflict(_) => ("conflict", self.to_string()),
            AppError::BadRequest(_) => ("bad_request", self.to_string()),
            AppError::Configuration(_) => ("configuration", self.to_string()),
            AppError::Token(_) => ("token", self.to_string()),
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                ("database", self.to_string())
            }
            AppError::Internal(_) => ("internal", self.to_string()),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
