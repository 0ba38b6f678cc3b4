use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::common::Coordinates;
use crate::domains::requests::SpatialBackend;

use super::models::{IpLocationResponse, LocationData};

pub const USER_LOCATION_FUNCTION: &str = "get-user-location";

/// Picks the best available position: the device fix, then IP lookup, then the fallback.
#[derive(Clone)]
pub struct LocationService {
    backend: Arc<dyn SpatialBackend>,
}

impl LocationService {
    pub fn new(backend: Arc<dyn SpatialBackend>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self))]
    pub async fn current_position(
        &self,
        device_fix: Option<Coordinates>,
        time_zone: Option<String>,
    ) -> LocationData {
        match device_fix {
            Some(fix) if fix.is_valid() => {
                info!("Using device location");
                return LocationData::from_device(fix, time_zone);
            }
            Some(_) => warn!("Ignoring out-of-range device location"),
            None => {}
        }

        match self.ip_location().await {
            Some(location) => location,
            None => {
                warn!("All location methods failed, using default location");
                LocationData::fallback()
            }
        }
    }

    async fn ip_location(&self) -> Option<LocationData> {
        let data = match self.backend.invoke_function(USER_LOCATION_FUNCTION).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Location function failed");
                return None;
            }
        };

        if data.is_null() {
            warn!("No data received from location function");
            return None;
        }

        let response: IpLocationResponse = match serde_json::from_value(data) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Unreadable location function response");
                return None;
            }
        };

        let location = response.into_location();
        if location.is_none() {
            warn!("Location function returned unusable coordinates");
        }
        location
    }
}
