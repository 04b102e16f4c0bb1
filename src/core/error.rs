use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Repository timed out: {0}")]
    RepositoryTimeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slug conflict: {0}")]
    SlugConflict(String),

    #[error("Cycle detected: {0}")]
    Cycle(String),

    #[error("Category in use: {0}")]
    InUse(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::Repository(ref msg) => {
                tracing::error!("Repository error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Category store error occurred".to_string(),
                    None,
                )
            }
            AppError::RepositoryTimeout(ref msg) => {
                tracing::error!("Repository timeout: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Category store did not respond in time".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::SlugConflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::Cycle(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::InUse(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_errors_map_to_statuses() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::SlugConflict("x".into()), StatusCode::CONFLICT),
            (AppError::Cycle("x".into()), StatusCode::CONFLICT),
            (AppError::InUse("x".into()), StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Repository("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::RepositoryTimeout("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
