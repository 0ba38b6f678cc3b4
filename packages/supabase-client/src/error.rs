//! Error types for the Supabase client.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Supabase client operations.
pub type Result<T> = std::result::Result<T, SupabaseError>;

/// Coarse failure classes shared by every caller of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    Timeout,
    ValidationError,
    NotFound,
    AuthError,
    RateLimitExceeded,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Failures that a second attempt cannot fix. The retry policy gives up on these immediately.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ErrorCode::AuthError | ErrorCode::NotFound | ErrorCode::ValidationError
        )
    }

    /// Failures worth offering the user a "try again" for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::NetworkError | ErrorCode::Timeout)
    }

    /// Friendly text for end users. `None` for codes that should show the raw message.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            ErrorCode::NetworkError => Some("Network connection problem. Please try again."),
            ErrorCode::Timeout => Some("Request timed out. Please try again."),
            ErrorCode::AuthError => Some("Authentication failed. Please sign in again."),
            ErrorCode::NotFound => Some("The requested item was not found."),
            ErrorCode::ValidationError => Some("Please check your input and try again."),
            ErrorCode::RateLimitExceeded => {
                Some("Too many requests. Please wait a moment and try again.")
            }
            ErrorCode::UnknownError => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supabase client errors.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Configuration error (missing URL or key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure (DNS, connection refused, reset)
    #[error("Network error: Unable to connect to the server. ({0})")]
    Network(String),

    /// The operation lost the race against its deadline
    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Non-2xx response from PostgREST or an edge function
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: ErrorCode,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SupabaseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SupabaseError::Network(_) => ErrorCode::NetworkError,
            SupabaseError::Timeout { .. } => ErrorCode::Timeout,
            SupabaseError::Api { code, .. } => *code,
            SupabaseError::Config(_) | SupabaseError::Parse(_) => ErrorCode::UnknownError,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            SupabaseError::Api { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SupabaseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SupabaseError::Timeout {
                operation: e
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|| "request".into()),
                timeout_ms: 0,
            }
        } else if e.is_decode() {
            SupabaseError::Parse(e.to_string())
        } else {
            SupabaseError::Network(e.to_string())
        }
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgrestErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Map an HTTP status plus PostgREST error body onto an [`ErrorCode`].
pub fn classify_status(status: u16, body: &PostgrestErrorBody) -> ErrorCode {
    let message = body.message.as_deref().unwrap_or_default();
    if status == 401 || status == 403 || message.contains("JWT") {
        return ErrorCode::AuthError;
    }
    if status == 404 || body.code.as_deref() == Some("PGRST116") {
        return ErrorCode::NotFound;
    }
    match status {
        400 | 422 => ErrorCode::ValidationError,
        408 | 504 => ErrorCode::Timeout,
        429 => ErrorCode::RateLimitExceeded,
        _ => ErrorCode::UnknownError,
    }
}

/// Build an [`SupabaseError::Api`] from a raw error response body.
pub fn api_error(status: u16, raw_body: &str) -> SupabaseError {
    let body: PostgrestErrorBody = serde_json::from_str(raw_body).unwrap_or_default();
    let code = classify_status(status, &body);
    let message = body
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if raw_body.trim().is_empty() {
                "Unknown database error".to_string()
            } else {
                raw_body.trim().to_string()
            }
        });
    let details = body.details.as_ref().map(|d| match d {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    SupabaseError::Api {
        status,
        code,
        message,
        details,
        hint: body.hint,
    }
}
