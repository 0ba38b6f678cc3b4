//! JSON error responses.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use supabase_client::ErrorCode;

use crate::common::error_log::user_message;
use crate::common::{ErrorRecord, SpatialError, ValidationError};

/// Error body: `{ "error": CODE, "message": friendly, "details": text }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    raw: String,
    details: Option<String>,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AuthError => StatusCode::UNAUTHORIZED,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
            ErrorCode::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn validation(reason: String) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            raw: reason,
            details: None,
        }
    }
}

impl From<SpatialError> for ApiError {
    fn from(e: SpatialError) -> Self {
        Self {
            code: e.code(),
            raw: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        SpatialError::from(e).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::validation(e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::validation(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::validation(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Validation messages are already user-facing; keep them visible in `details`.
        let details = self.details.clone().or_else(|| Some(self.raw.clone()));
        let body = ErrorBody {
            error: self.code,
            message: user_message(Some(self.code), &self.raw),
            details,
        };

        let record = ErrorRecord::from_code(self.code, self.raw, self.details);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(record);
        response
    }
}
