use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use serde::Deserialize;

use crate::common::Coordinates;
use crate::domains::location::LocationData;
use crate::server::middleware::ClientIp;
use crate::server::{ApiError, AppState};

/// Body of POST /api/location/current. All fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_zone: Option<String>,
}

impl CurrentLocationRequest {
    fn device_fix(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }
}

/// GET /api/location
///
/// Geolocates the caller by IP. Private or missing addresses get the fallback location.
pub async fn ip_location_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
) -> Json<LocationData> {
    let ip = client_ip.and_then(|Extension(ClientIp(ip))| ip);
    Json(state.locator.locate(ip).await)
}

/// POST /api/location/current
///
/// Uses the device's own fix when it is valid, otherwise asks the backend.
pub async fn current_location_handler(
    Extension(state): Extension<AppState>,
    body: Result<Json<CurrentLocationRequest>, JsonRejection>,
) -> Result<Json<LocationData>, ApiError> {
    let Json(body) = body?;
    let location = state
        .location
        .current_position(body.device_fix(), body.time_zone)
        .await;
    Ok(Json(location))
}
