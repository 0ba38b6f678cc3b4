use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::MapBounds;
use crate::domains::clustering::{
    ClusterFeature, ClusterOptions, ClusterOptionsUpdate, ClusterStats,
};
use crate::domains::requests::{RequestWithDistance, SpatialQueryOptions};
use crate::server::{ApiError, AppState};

/// Body of POST /api/clusters/load: the viewport to fetch plus filters.
#[derive(Debug, Deserialize)]
pub struct LoadClustersRequest {
    #[serde(flatten)]
    pub bounds: MapBounds,
    #[serde(flatten)]
    pub options: SpatialQueryOptions,
}

#[derive(Debug, Serialize)]
pub struct LoadClustersResponse {
    /// Rows returned by the backend.
    pub fetched: usize,
    /// Rows with a usable location, now in the index.
    pub clustered: usize,
}

#[derive(Debug, Deserialize)]
pub struct ClustersQuery {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub zoom: f64,
}

#[derive(Debug, Serialize)]
pub struct ExpansionZoomResponse {
    pub cluster_id: usize,
    pub expansion_zoom: usize,
}

/// POST /api/clusters/load
pub async fn load_clusters_handler(
    Extension(state): Extension<AppState>,
    body: Result<Json<LoadClustersRequest>, JsonRejection>,
) -> Result<Json<LoadClustersResponse>, ApiError> {
    let Json(body) = body?;

    let requests = state
        .spatial
        .get_requests_in_bounds(&body.bounds, &body.options)
        .await?;
    let fetched = requests.len();

    let mut clustering = state.clustering.write().await;
    clustering.load_requests(requests);
    let clustered = clustering.total_points();

    info!(fetched, clustered, "Clustering index reloaded");
    Ok(Json(LoadClustersResponse { fetched, clustered }))
}

/// GET /api/clusters
pub async fn clusters_handler(
    Extension(state): Extension<AppState>,
    query: Result<Query<ClustersQuery>, QueryRejection>,
) -> Result<Json<Vec<ClusterFeature>>, ApiError> {
    let Query(q) = query?;
    let clustering = state.clustering.read().await;
    Ok(Json(
        clustering.get_clusters([q.west, q.south, q.east, q.north], q.zoom),
    ))
}

/// GET /api/clusters/:id/leaves
pub async fn cluster_leaves_handler(
    Extension(state): Extension<AppState>,
    id: Result<Path<usize>, PathRejection>,
) -> Result<Json<Vec<RequestWithDistance>>, ApiError> {
    let Path(id) = id?;
    let clustering = state.clustering.read().await;
    Ok(Json(clustering.get_cluster_expansion_points(id)))
}

/// GET /api/clusters/:id/expansion-zoom
pub async fn cluster_expansion_zoom_handler(
    Extension(state): Extension<AppState>,
    id: Result<Path<usize>, PathRejection>,
) -> Result<Json<ExpansionZoomResponse>, ApiError> {
    let Path(cluster_id) = id?;
    let clustering = state.clustering.read().await;
    Ok(Json(ExpansionZoomResponse {
        cluster_id,
        expansion_zoom: clustering.get_cluster_expansion_zoom(cluster_id),
    }))
}

/// GET /api/clusters/stats
pub async fn cluster_stats_handler(Extension(state): Extension<AppState>) -> Json<ClusterStats> {
    Json(state.clustering.read().await.get_stats())
}

/// PATCH /api/clusters/options
pub async fn update_cluster_options_handler(
    Extension(state): Extension<AppState>,
    body: Result<Json<ClusterOptionsUpdate>, JsonRejection>,
) -> Result<Json<ClusterOptions>, ApiError> {
    let Json(update) = body?;
    let mut clustering = state.clustering.write().await;
    clustering.update_options(update)?;
    Ok(Json(*clustering.options()))
}

/// DELETE /api/clusters
pub async fn clear_clusters_handler(Extension(state): Extension<AppState>) -> StatusCode {
    state.clustering.write().await.clear();
    StatusCode::NO_CONTENT
}
