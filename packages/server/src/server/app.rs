//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::common::ErrorLog;
use crate::domains::clustering::{ClusterOptions, MapClusteringService};
use crate::domains::location::{IpLocator, LocationService};
use crate::domains::requests::{SpatialBackend, SpatialQueryService};
use crate::server::middleware::{extract_client_ip, record_errors};
use crate::server::routes::{
    clear_clusters_handler, cluster_expansion_zoom_handler, cluster_leaves_handler,
    cluster_stats_handler, clusters_handler, clear_errors_handler, current_location_handler,
    errors_handler, health_handler, ip_location_handler, load_clusters_handler,
    requests_in_bounds_handler, requests_in_radius_handler, update_cluster_options_handler,
    validate_geometries_handler,
};

/// Upper bound for a whole request, retries included.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn SpatialBackend>,
    pub spatial: SpatialQueryService,
    pub location: LocationService,
    pub locator: Arc<dyn IpLocator>,
    pub clustering: Arc<RwLock<MapClusteringService>>,
    pub errors: Arc<Mutex<ErrorLog>>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn SpatialBackend>,
        locator: Arc<dyn IpLocator>,
        cluster_options: ClusterOptions,
    ) -> Self {
        Self {
            spatial: SpatialQueryService::new(backend.clone()),
            location: LocationService::new(backend.clone()),
            backend,
            locator,
            clustering: Arc::new(RwLock::new(MapClusteringService::new(cluster_options))),
            errors: Arc::new(Mutex::new(ErrorLog::new())),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/requests/bounds", get(requests_in_bounds_handler))
        .route("/requests/radius", get(requests_in_radius_handler))
        .route(
            "/requests/validate-geometries",
            post(validate_geometries_handler),
        )
        .route("/clusters", get(clusters_handler).delete(clear_clusters_handler))
        .route("/clusters/load", post(load_clusters_handler))
        .route("/clusters/stats", get(cluster_stats_handler))
        .route("/clusters/options", patch(update_cluster_options_handler))
        .route("/clusters/:id/leaves", get(cluster_leaves_handler))
        .route(
            "/clusters/:id/expansion-zoom",
            get(cluster_expansion_zoom_handler),
        )
        .route("/location", get(ip_location_handler))
        .route("/location/current", post(current_location_handler))
        .route("/errors", get(errors_handler).delete(clear_errors_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(record_errors))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(state))
        .layer(TimeoutLayer::new(HANDLER_TIMEOUT))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
