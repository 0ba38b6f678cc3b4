use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{miles_to_meters, MapBounds, ValidationError};
use crate::domains::requests::{
    RequestCategory, RequestStatus, RequestWithDistance, SpatialQueryOptions, DEFAULT_LIMIT,
};
use crate::server::{ApiError, AppState};

/// Filter parameters into query options.
///
/// The query structs list filters field by field; `serde(flatten)` loses number
/// parsing in query strings.
fn filter_options(
    category: Option<RequestCategory>,
    subcategory: Option<String>,
    status: Option<RequestStatus>,
    limit: Option<u32>,
) -> SpatialQueryOptions {
    SpatialQueryOptions {
        category,
        subcategory,
        status: status.unwrap_or_default(),
        limit: limit.unwrap_or(DEFAULT_LIMIT),
    }
}

#[derive(Debug, Deserialize)]
pub struct BoundsQuery {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub category: Option<RequestCategory>,
    pub subcategory: Option<String>,
    pub status: Option<RequestStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RadiusQuery {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lng: f64,
    pub radius_meters: Option<f64>,
    pub radius_miles: Option<f64>,
    pub category: Option<RequestCategory>,
    pub subcategory: Option<String>,
    pub status: Option<RequestStatus>,
    pub limit: Option<u32>,
}

impl RadiusQuery {
    /// Meters take precedence over miles when both are given.
    fn radius_meters(&self) -> Result<f64, ValidationError> {
        match (self.radius_meters, self.radius_miles) {
            (Some(meters), _) => Ok(meters),
            (None, Some(miles)) => Ok(miles_to_meters(miles)),
            (None, None) => Err(ValidationError::Parameter {
                name: "radius_meters",
                reason: "radius_meters or radius_miles is required".into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestsResponse {
    pub count: usize,
    pub requests: Vec<RequestWithDistance>,
}

impl From<Vec<RequestWithDistance>> for RequestsResponse {
    fn from(requests: Vec<RequestWithDistance>) -> Self {
        Self {
            count: requests.len(),
            requests,
        }
    }
}

/// GET /api/requests/bounds
pub async fn requests_in_bounds_handler(
    Extension(state): Extension<AppState>,
    query: Result<Query<BoundsQuery>, QueryRejection>,
) -> Result<Json<RequestsResponse>, ApiError> {
    let Query(query) = query?;
    let bounds = MapBounds {
        north: query.north,
        south: query.south,
        east: query.east,
        west: query.west,
    };
    let options = filter_options(query.category, query.subcategory, query.status, query.limit);

    let requests = state.spatial.get_requests_in_bounds(&bounds, &options).await?;
    Ok(Json(requests.into()))
}

/// GET /api/requests/radius
pub async fn requests_in_radius_handler(
    Extension(state): Extension<AppState>,
    query: Result<Query<RadiusQuery>, QueryRejection>,
) -> Result<Json<RequestsResponse>, ApiError> {
    let Query(query) = query?;
    let radius_meters = query.radius_meters()?;
    let options = filter_options(query.category, query.subcategory, query.status, query.limit);

    let requests = state
        .spatial
        .get_requests_in_radius(query.lat, query.lng, radius_meters, &options)
        .await?;
    Ok(Json(requests.into()))
}

/// POST /api/requests/validate-geometries
pub async fn validate_geometries_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let report = state.spatial.validate_request_geometries().await?;
    Ok(Json(report))
}
