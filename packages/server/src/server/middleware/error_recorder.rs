use axum::{extract::Request, middleware::Next, response::Response, Extension};

use crate::common::ErrorRecord;
use crate::server::app::AppState;

/// Copy every failure a handler rendered into the shared error log.
pub async fn record_errors(
    Extension(state): Extension<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if let Some(record) = response.extensions().get::<ErrorRecord>() {
        state.errors.lock().await.add(record.clone());
    }

    response
}
