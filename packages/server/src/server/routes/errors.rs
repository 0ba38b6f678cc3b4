use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::common::ErrorRecord;
use crate::server::app::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorView {
    #[serde(flatten)]
    pub record: ErrorRecord,
    pub user_message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorsResponse {
    pub online: bool,
    pub errors: Vec<ErrorView>,
}

/// GET /api/errors - recent failures, newest first.
pub async fn errors_handler(Extension(state): Extension<AppState>) -> Json<ErrorsResponse> {
    let log = state.errors.lock().await;
    let errors = log
        .errors()
        .map(|record| ErrorView {
            user_message: log.user_friendly_message(record),
            record: record.clone(),
        })
        .collect();

    Json(ErrorsResponse {
        online: log.is_online(),
        errors,
    })
}

/// DELETE /api/errors
pub async fn clear_errors_handler(Extension(state): Extension<AppState>) -> StatusCode {
    state.errors.lock().await.clear_all();
    StatusCode::NO_CONTENT
}
