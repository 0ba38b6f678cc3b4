//! Bounded log of recent failures with user-facing messages.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use supabase_client::{ErrorCode, SupabaseError};
use tracing::error;

use super::error::SpatialError;

/// How many records the log keeps; older entries fall off the end.
pub const MAX_ERRORS: usize = 10;

const OFFLINE_MESSAGE: &str = "You appear to be offline. Please check your internet connection.";
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
}

impl ErrorRecord {
    /// A plain message without a classified code.
    pub fn message(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            timestamp: Utc::now(),
            retryable,
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            details,
            timestamp: Utc::now(),
            retryable: code.is_retryable(),
        }
    }
}

impl From<&SupabaseError> for ErrorRecord {
    fn from(e: &SupabaseError) -> Self {
        Self::from_code(e.code(), e.to_string(), e.details().map(String::from))
    }
}

impl From<&SpatialError> for ErrorRecord {
    fn from(e: &SpatialError) -> Self {
        Self::from_code(e.code(), e.to_string(), e.details())
    }
}

/// Newest-first failure history.
#[derive(Debug)]
pub struct ErrorLog {
    errors: VecDeque<ErrorRecord>,
    online: bool,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self {
            errors: VecDeque::with_capacity(MAX_ERRORS + 1),
            online: true,
        }
    }
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: impl Into<ErrorRecord>) {
        let record = record.into();
        error!(
            message = %record.message,
            code = record.code.map(|c| c.as_str()),
            retryable = record.retryable,
            "Error handled"
        );
        self.errors.push_front(record);
        self.errors.truncate(MAX_ERRORS);
    }

    /// Remove the record at `index`. Out-of-range indexes are ignored.
    pub fn clear(&mut self, index: usize) {
        self.errors.remove(index);
    }

    pub fn clear_all(&mut self) {
        self.errors.clear();
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn latest(&self) -> Option<&ErrorRecord> {
        self.errors.front()
    }

    pub fn retryable_errors(&self) -> Vec<&ErrorRecord> {
        self.errors.iter().filter(|e| e.retryable).collect()
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn user_friendly_message(&self, record: &ErrorRecord) -> String {
        if !self.online {
            return OFFLINE_MESSAGE.to_string();
        }
        user_message(record.code, &record.message)
    }
}

/// Friendly text for a code, falling back to the raw message.
pub fn user_message(code: Option<ErrorCode>, message: &str) -> String {
    match code.and_then(|c| c.user_message()) {
        Some(text) => text.to_string(),
        None if !message.is_empty() => message.to_string(),
        None => GENERIC_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_capped() {
        let mut log = ErrorLog::new();
        for i in 0..15 {
            log.add(ErrorRecord::message(format!("error {i}"), false));
        }

        assert_eq!(log.len(), MAX_ERRORS);
        assert_eq!(log.latest().unwrap().message, "error 14");
        assert_eq!(log.errors().last().unwrap().message, "error 5");
    }

    #[test]
    fn test_clear() {
        let mut log = ErrorLog::new();
        log.add(ErrorRecord::message("first", false));
        log.add(ErrorRecord::message("second", false));

        log.clear(0);
        assert_eq!(log.latest().unwrap().message, "first");

        log.clear(42);
        assert_eq!(log.len(), 1);

        log.clear_all();
        assert!(!log.has_errors());
    }

    #[test]
    fn test_backend_errors_are_classified() {
        let mut log = ErrorLog::new();
        log.add(&SupabaseError::Network("connection refused".into()));
        log.add(&SupabaseError::Api {
            status: 401,
            code: ErrorCode::AuthError,
            message: "JWT expired".into(),
            details: None,
            hint: None,
        });

        let retryable = log.retryable_errors();
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].code, Some(ErrorCode::NetworkError));
    }

    #[test]
    fn test_user_friendly_messages() {
        let mut log = ErrorLog::new();
        let timeout = ErrorRecord::from_code(ErrorCode::Timeout, "took too long", None);
        assert_eq!(
            log.user_friendly_message(&timeout),
            "Request timed out. Please try again."
        );

        let unknown = ErrorRecord::from_code(ErrorCode::UnknownError, "disk on fire", None);
        assert_eq!(log.user_friendly_message(&unknown), "disk on fire");

        let blank = ErrorRecord::message("", false);
        assert_eq!(
            log.user_friendly_message(&blank),
            "Something went wrong. Please try again."
        );

        log.set_online(false);
        assert_eq!(log.user_friendly_message(&timeout), OFFLINE_MESSAGE);
    }
}
