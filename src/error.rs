use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::login::AuthError;
use crate::practice::PracticeError;
use crate::storage::StoreError;

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidUsername(_) | StoreError::InvalidId(_) | StoreError::MissingField(_) => {
                AppError::BadRequest(e.to_string())
            }
            StoreError::CardNotFound(_) => AppError::NotFound(e.to_string()),
            StoreError::DuplicateId(_) => AppError::Conflict(e.to_string()),
            StoreError::Io(_) | StoreError::Json(_) => {
                error!("Storage failure: {}", e);
                AppError::Internal("storage failure".to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingFields | AuthError::UserExists => AppError::BadRequest(e.to_string()),
            AuthError::InvalidCredentials => AppError::Unauthorized,
            AuthError::Hashing => {
                error!("{}", e);
                AppError::Internal(e.to_string())
            }
            AuthError::Store(inner) => inner.into(),
        }
    }
}

impl From<PracticeError> for AppError {
    fn from(e: PracticeError) -> Self {
        match e {
            PracticeError::InvalidLimit(_) => AppError::BadRequest(e.to_string()),
            PracticeError::NoCards | PracticeError::InvalidTransition { .. } => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (StoreError::MissingField("term").into(), StatusCode::BAD_REQUEST),
            (StoreError::CardNotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (StoreError::DuplicateId("x".into()).into(), StatusCode::CONFLICT),
            (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (AuthError::UserExists.into(), StatusCode::BAD_REQUEST),
            (PracticeError::InvalidLimit("0".into()).into(), StatusCode::BAD_REQUEST),
            (PracticeError::NoCards.into(), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
