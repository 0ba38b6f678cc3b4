//! IP geolocation against an ipapi-compatible service.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::models::{LocationAccuracy, LocationData, LocationSource, FALLBACK_TIME_ZONE};

pub const DEFAULT_IP_GEOLOCATION_URL: &str = "https://ipapi.co";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; Kindr/1.0)";

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("No public client IP available")]
    NoPublicIp,

    #[error("IP geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IP geolocation service returned status {0}")]
    Status(u16),

    #[error("Empty response from geolocation service")]
    EmptyBody,

    #[error("Invalid JSON response from geolocation service: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IP geolocation service error: {0}")]
    Service(String),

    #[error("Missing latitude or longitude in API response")]
    MissingCoordinates,
}

/// Turns a client IP into a location. Never fails; unresolvable callers get the fallback.
#[async_trait]
pub trait IpLocator: Send + Sync {
    async fn locate(&self, ip: Option<IpAddr>) -> LocationData;
}

/// ipapi.co response. `error` is sometimes sent as a string.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

impl IpApiResponse {
    fn is_error(&self) -> bool {
        match &self.error {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag == "true",
            _ => false,
        }
    }

    fn into_location(self) -> Result<LocationData, LocatorError> {
        if self.is_error() {
            let reason = self
                .reason
                .or(self.message)
                .unwrap_or_else(|| "IP geolocation service error".into());
            return Err(LocatorError::Service(reason));
        }

        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) => {
                (lat, lng)
            }
            _ => return Err(LocatorError::MissingCoordinates),
        };

        Ok(LocationData {
            latitude,
            longitude,
            city: self.city.unwrap_or_else(|| "Los Angeles".into()),
            country: self.country_name.unwrap_or_else(|| "United States".into()),
            country_code: self.country_code.unwrap_or_else(|| "US".into()),
            time_zone: self.timezone.unwrap_or_else(|| FALLBACK_TIME_ZONE.into()),
            accuracy: LocationAccuracy::Medium,
            source: LocationSource::Ip,
        })
    }
}

/// Client for `{base_url}/{ip}/json/`.
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Default for IpApiLocator {
    fn default() -> Self {
        Self::new(DEFAULT_IP_GEOLOCATION_URL)
    }
}

impl IpApiLocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up a single address without falling back.
    #[instrument(skip(self))]
    pub async fn lookup(&self, ip: IpAddr) -> Result<LocationData, LocatorError> {
        let url = format!("{}/{}/json/", self.base_url, ip);

        let response = self
            .http_client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocatorError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(LocatorError::EmptyBody);
        }

        let parsed: IpApiResponse = serde_json::from_str(&body)?;
        parsed.into_location()
    }
}

#[async_trait]
impl IpLocator for IpApiLocator {
    async fn locate(&self, ip: Option<IpAddr>) -> LocationData {
        let result = match ip {
            Some(ip) => self.lookup(ip).await,
            None => Err(LocatorError::NoPublicIp),
        };

        match result {
            Ok(location) => {
                debug!(city = %location.city, "Resolved location from IP");
                location
            }
            Err(e) => {
                warn!(error = %e, "Geolocation failed, using fallback location");
                LocationData::fallback()
            }
        }
    }
}
