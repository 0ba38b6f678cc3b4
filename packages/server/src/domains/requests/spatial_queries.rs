//! Bounds and radius queries against the backend's PostGIS procedures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::common::{validate_bounds, validate_radius, MapBounds, SpatialError, SpatialResult};

use super::backend::SpatialBackend;
use super::models::{RequestCategory, RequestRow, RequestStatus, RequestWithDistance};

pub const BOUNDS_PROCEDURE: &str = "get_requests_in_bounds";
pub const RADIUS_PROCEDURE: &str = "get_requests_in_radius";
pub const VALIDATE_GEOMETRIES_PROCEDURE: &str = "validate_request_geometries";

/// Default row cap sent to the procedures.
pub const DEFAULT_LIMIT: u32 = 100;

/// Filters shared by the bounds and radius queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialQueryOptions {
    #[serde(default)]
    pub category: Option<RequestCategory>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for SpatialQueryOptions {
    fn default() -> Self {
        Self {
            category: None,
            subcategory: None,
            status: RequestStatus::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SpatialQueryOptions {
    /// Procedure parameters for the filters. Empty subcategories are sent as null.
    fn filter_params(&self) -> [(&'static str, Value); 4] {
        let subcategory = self
            .subcategory
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(Value::from)
            .unwrap_or(Value::Null);

        [
            (
                "p_category",
                self.category
                    .map(|c| Value::from(c.as_str()))
                    .unwrap_or(Value::Null),
            ),
            ("p_subcategory", subcategory),
            ("p_status", Value::from(self.status.as_str())),
            ("p_limit", Value::from(self.limit)),
        ]
    }
}

/// Parameters for [`BOUNDS_PROCEDURE`].
pub fn bounds_params(bounds: &MapBounds, options: &SpatialQueryOptions) -> Value {
    let mut params = json!({
        "north": bounds.north,
        "south": bounds.south,
        "east": bounds.east,
        "west": bounds.west,
    });
    extend(&mut params, options);
    params
}

/// Parameters for [`RADIUS_PROCEDURE`].
pub fn radius_params(
    center_lat: f64,
    center_lng: f64,
    radius_meters: f64,
    options: &SpatialQueryOptions,
) -> Value {
    let mut params = json!({
        "center_lat": center_lat,
        "center_lng": center_lng,
        "radius_meters": radius_meters,
    });
    extend(&mut params, options);
    params
}

fn extend(params: &mut Value, options: &SpatialQueryOptions) {
    if let Value::Object(map) = params {
        for (key, value) in options.filter_params() {
            map.insert(key.to_string(), value);
        }
    }
}

/// Reshape raw procedure rows. A null result is treated as no rows.
pub fn transform_rows(
    function: &'static str,
    data: Value,
) -> SpatialResult<Vec<RequestWithDistance>> {
    if data.is_null() {
        return Ok(Vec::new());
    }

    let rows: Vec<RequestRow> =
        serde_json::from_value(data).map_err(|source| SpatialError::Decode { function, source })?;

    Ok(rows.into_iter().map(RequestWithDistance::from).collect())
}

/// Validates query parameters, calls the backend procedure and reshapes its rows.
#[derive(Clone)]
pub struct SpatialQueryService {
    backend: Arc<dyn SpatialBackend>,
}

impl SpatialQueryService {
    pub fn new(backend: Arc<dyn SpatialBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SpatialBackend> {
        &self.backend
    }

    /// Requests whose point lies inside the viewport.
    #[instrument(skip(self))]
    pub async fn get_requests_in_bounds(
        &self,
        bounds: &MapBounds,
        options: &SpatialQueryOptions,
    ) -> SpatialResult<Vec<RequestWithDistance>> {
        info!("Fetching requests in bounds");
        validate_bounds(bounds)?;

        let data = self
            .backend
            .call_rpc(BOUNDS_PROCEDURE, bounds_params(bounds, options))
            .await
            .map_err(|e| {
                error!(error = %e, "Error fetching requests in bounds");
                SpatialError::from(e)
            })?;

        let requests = transform_rows(BOUNDS_PROCEDURE, data)?;
        info!(count = requests.len(), "Found requests in bounds");
        Ok(requests)
    }

    /// Requests within `radius_meters` of the center, with distances.
    #[instrument(skip(self))]
    pub async fn get_requests_in_radius(
        &self,
        center_lat: f64,
        center_lng: f64,
        radius_meters: f64,
        options: &SpatialQueryOptions,
    ) -> SpatialResult<Vec<RequestWithDistance>> {
        info!("Fetching requests in radius");
        validate_radius(center_lat, center_lng, radius_meters)?;

        let data = self
            .backend
            .call_rpc(
                RADIUS_PROCEDURE,
                radius_params(center_lat, center_lng, radius_meters, options),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Error fetching requests in radius");
                SpatialError::from(e)
            })?;

        let requests = transform_rows(RADIUS_PROCEDURE, data)?;
        info!(count = requests.len(), "Found requests in radius");
        Ok(requests)
    }

    /// Ask the backend to check and repair stored geometries. Returns its report rows.
    #[instrument(skip(self))]
    pub async fn validate_request_geometries(&self) -> SpatialResult<Vec<Value>> {
        info!("Validating request geometries");

        let data = self
            .backend
            .call_rpc(VALIDATE_GEOMETRIES_PROCEDURE, json!({}))
            .await
            .map_err(|e| {
                error!(error = %e, "Error validating geometries");
                SpatialError::from(e)
            })?;

        let report = match data {
            Value::Null => Vec::new(),
            Value::Array(rows) => rows,
            other => vec![other],
        };
        info!(rows = report.len(), "Geometry validation completed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ValidationError;
    use crate::testing::{sample_row, MockBackend};
    use supabase_client::{ErrorCode, SupabaseError};

    fn bounds() -> MapBounds {
        MapBounds {
            north: 34.1,
            south: 34.0,
            east: -118.2,
            west: -118.3,
        }
    }

    #[test]
    fn test_bounds_params_apply_defaults() {
        let params = bounds_params(&bounds(), &SpatialQueryOptions::default());
        assert_eq!(
            params,
            json!({
                "north": 34.1,
                "south": 34.0,
                "east": -118.2,
                "west": -118.3,
                "p_category": null,
                "p_subcategory": null,
                "p_status": "active",
                "p_limit": 100,
            })
        );
    }

    #[test]
    fn test_empty_subcategory_is_sent_as_null() {
        let options = SpatialQueryOptions {
            category: Some(RequestCategory::HelpNeeded),
            subcategory: Some(String::new()),
            status: RequestStatus::InProgress,
            limit: 25,
        };
        let params = radius_params(34.0, -118.0, 500.0, &options);
        assert_eq!(params["p_category"], "help-needed");
        assert_eq!(params["p_subcategory"], Value::Null);
        assert_eq!(params["p_status"], "in-progress");
        assert_eq!(params["p_limit"], 25);
        assert_eq!(params["radius_meters"], 500.0);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: SpatialQueryOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, SpatialQueryOptions::default());
    }

    #[tokio::test]
    async fn test_bounds_query_calls_procedure() {
        let backend = Arc::new(MockBackend::new().with_rpc_response(
            BOUNDS_PROCEDURE,
            json!([sample_row(34.05, -118.25), sample_row(34.06, -118.26)]),
        ));
        let service = SpatialQueryService::new(backend.clone());

        let requests = service
            .get_requests_in_bounds(&bounds(), &SpatialQueryOptions::default())
            .await
            .unwrap();

        assert_eq!(requests.len(), 2);
        let calls = backend.rpc_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, BOUNDS_PROCEDURE);
        assert_eq!(calls[0].1["north"], 34.1);
    }

    #[tokio::test]
    async fn test_invalid_bounds_never_reach_backend() {
        let backend = Arc::new(MockBackend::new());
        let service = SpatialQueryService::new(backend.clone());

        let inverted = MapBounds {
            north: 34.0,
            south: 34.1,
            ..bounds()
        };
        let err = service
            .get_requests_in_bounds(&inverted, &SpatialQueryOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SpatialError::Validation(ValidationError::NorthNotAboveSouth)
        ));
        assert!(backend.rpc_calls().is_empty());
    }

    #[tokio::test]
    async fn test_radius_query_rejects_large_radius() {
        let backend = Arc::new(MockBackend::new());
        let service = SpatialQueryService::new(backend.clone());

        let err = service
            .get_requests_in_radius(34.0, -118.0, 60_000.0, &SpatialQueryOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(backend.rpc_calls().is_empty());
    }

    #[tokio::test]
    async fn test_null_result_is_empty() {
        let backend = Arc::new(MockBackend::new().with_rpc_response(RADIUS_PROCEDURE, Value::Null));
        let service = SpatialQueryService::new(backend);

        let requests = service
            .get_requests_in_radius(34.0, -118.0, 1000.0, &SpatialQueryOptions::default())
            .await
            .unwrap();
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_backend_errors_keep_their_code() {
        let backend = Arc::new(MockBackend::new().with_rpc_error(
            BOUNDS_PROCEDURE,
            SupabaseError::Timeout {
                operation: BOUNDS_PROCEDURE.into(),
                timeout_ms: 10_000,
            },
        ));
        let service = SpatialQueryService::new(backend);

        let err = service
            .get_requests_in_bounds(&bounds(), &SpatialQueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_decode_errors() {
        let backend = Arc::new(
            MockBackend::new().with_rpc_response(BOUNDS_PROCEDURE, json!([{ "id": "nope" }])),
        );
        let service = SpatialQueryService::new(backend);

        let err = service
            .get_requests_in_bounds(&bounds(), &SpatialQueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpatialError::Decode { function, .. } if function == BOUNDS_PROCEDURE));
    }

    #[tokio::test]
    async fn test_validate_request_geometries() {
        let backend = Arc::new(MockBackend::new().with_rpc_response(
            VALIDATE_GEOMETRIES_PROCEDURE,
            json!([{ "request_id": "x", "fixed": true }]),
        ));
        let service = SpatialQueryService::new(backend);

        let report = service.validate_request_geometries().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0]["fixed"], true);
    }
}
