use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::projections::ScheduleError;
use crate::store::StoreError;

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Schedule(ScheduleError),
    Store(StoreError),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Schedule(e) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("INVALID_PERIOD", e.to_string()),
            ),
            // Malformed uploads are the caller's fault, everything else is ours.
            AppError::Store(StoreError::Csv(e)) => {
                (StatusCode::BAD_REQUEST, ApiError::new("INVALID_CSV", e.to_string()))
            }
            AppError::Store(StoreError::UnknownLookup(name)) => (
                StatusCode::NOT_FOUND,
                ApiError::new("NOT_FOUND", format!("unknown lookup table '{}'", name)),
            ),
            AppError::Store(e) => {
                error!(error = %e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("STORAGE_ERROR", e.to_string()),
                )
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("INTERNAL_ERROR", msg),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        AppError::Schedule(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}
