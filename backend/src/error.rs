//! Unified error handling for the API.
//!
//! Handlers return [`ApiResult`] and use `?`; every error renders as a status
//! code plus a `{success: false, error, details?}` body.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::api::ErrorResponse;
use thiserror::Error;

use crate::llm::LlmError;
use crate::mail::MailError;

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Database connection pool error
    #[error("Database connection error")]
    ConnectionPool(#[source] diesel_async::pooled_connection::deadpool::PoolError),

    /// Database query error
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    /// Resource not found; the message is returned verbatim
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(anyhow::anyhow!(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Mail(e) => e.status(),
            ApiError::Llm(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for ApiError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        ApiError::ConnectionPool(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_message, details) = match &self {
            ApiError::ConnectionPool(e) => {
                tracing::error!("Connection pool error: {:?}", e);
                ("Database connection unavailable".to_string(), None)
            }
            ApiError::Database(diesel::result::Error::NotFound) => {
                ("Resource not found".to_string(), None)
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ("Database operation failed".to_string(), None)
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                ("Internal server error".to_string(), Some(format!("{:#}", e)))
            }
            ApiError::NotFound(msg) => (msg.clone(), None),
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (msg.clone(), None)
            }
            ApiError::Validation(e) => ("Invalid request".to_string(), Some(e.to_string())),
            ApiError::Unauthorized(msg) => (msg.clone(), None),
            ApiError::Mail(e) => {
                if status.is_server_error() {
                    tracing::error!("Mail error: {}", e);
                }
                (e.public_message().to_string(), e.details())
            }
            ApiError::Llm(e) => {
                tracing::error!("LLM error: {}", e);
                (e.public_message().to_string(), None)
            }
        };

        (status, Json(ErrorResponse::new(error_message, details))).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
