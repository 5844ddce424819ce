// ABOUTME: Shared API response types and error handling
// ABOUTME: Provides consistent response format across all API endpoints

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use stockboard_storage::{StorageError, StorageResult};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Structured payload for errors the client can act on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            code: None,
            details: None,
        }
    }
}

/// Storage error carried to the HTTP boundary
#[derive(Debug)]
pub struct ApiError(pub StorageError);

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::InvalidInput(_)
        | StorageError::DuplicateDestination(_)
        | StorageError::MismatchedSet(_)
        | StorageError::ExceedsRequested { .. } => StatusCode::BAD_REQUEST,
        StorageError::InvalidState(_)
        | StorageError::InvalidTransition { .. }
        | StorageError::InvalidTransferState(_)
        | StorageError::InsufficientStock { .. }
        | StorageError::NegativeStock { .. }
        | StorageError::AlreadyConfirmed
        | StorageError::AlreadyCancelled => StatusCode::CONFLICT,
        StorageError::Expired => StatusCode::GONE,
        StorageError::ValidationRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorageError::Io(_)
        | StorageError::Migration(_)
        | StorageError::Sqlx(_)
        | StorageError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(err: &StorageError) -> Option<Value> {
    match err {
        StorageError::ValidationRequired(details) => serde_json::to_value(details).ok(),
        StorageError::InsufficientStock {
            requested,
            available,
        } => Some(json!({ "requested": requested, "available": available })),
        StorageError::NegativeStock { current, change } => {
            Some(json!({ "current": current, "change": change }))
        }
        StorageError::ExceedsRequested {
            requested,
            received,
        } => Some(json!({ "requested": requested, "received": received })),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", err);
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        let mut body = ApiResponse::error(message);
        body.code = Some(err.code());
        body.details = details_for(&err);

        (status, ResponseJson(body)).into_response()
    }
}

/// 200 with the envelope, or the mapped error
pub fn ok_or_error<T: Serialize>(result: StorageResult<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, ResponseJson(ApiResponse::success(data))).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

/// 201 with the envelope, or the mapped error
pub fn created_or_error<T: Serialize>(result: StorageResult<T>) -> Response {
    match result {
        Ok(data) => {
            (StatusCode::CREATED, ResponseJson(ApiResponse::success(data))).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}
