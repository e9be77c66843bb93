//! Error types for the booknotes server
//!
//! All errors use thiserror for structured error handling.
//! Every variant maps onto exactly one HTTP status when it reaches a handler.

use crate::validation::ValidationErrors;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Missing row, or a row the caller's visibility does not admit.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::BlobStore(_)
            | AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            AppError::Validation(errors) => (status, Json(errors)).into_response(),
            AppError::NotFound(entity) => (
                status,
                Json(serde_json::json!({ "message": format!("{} not found", entity) })),
            )
                .into_response(),
            AppError::Unauthenticated | AppError::BadRequest(_) => (
                status,
                Json(serde_json::json!({ "message": self.to_string() })),
            )
                .into_response(),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    status,
                    Json(serde_json::json!({ "message": "Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
