use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Auth(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Store(e) => {
                // Cause stays in the log; clients get a generic message
                error!("Store failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
            }
            AppError::Internal(msg) => {
                error!("Internal failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("Invalid Stock".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("User already exists".into()), StatusCode::CONFLICT),
            (AppError::Auth("Invalid credentials".into()), StatusCode::UNAUTHORIZED),
            (AppError::Store(StoreError::LockPoisoned), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
