use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    backend: BackendHealth,
    recent_errors: usize,
    clustered_points: usize,
}

#[derive(Serialize)]
pub struct BackendHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Checks backend connectivity (bounded by the client's own 5s check timeout)
/// and reports how many failures the error log holds.
///
/// Returns 200 OK if the backend is reachable, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let connected = state.backend.check_connection().await;

    let backend = if connected {
        BackendHealth {
            status: "ok".to_string(),
            error: None,
        }
    } else {
        BackendHealth {
            status: "error".to_string(),
            error: Some("Backend connection check failed".to_string()),
        }
    };

    let recent_errors = {
        let mut errors = state.errors.lock().await;
        errors.set_online(connected);
        errors.len()
    };
    let clustered_points = state.clustering.read().await.total_points();

    let (status_code, overall_status) = if connected {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall_status.to_string(),
            backend,
            recent_errors,
            clustered_points,
        }),
    )
}
