use serde::{Deserialize, Deserializer, Serialize};

use crate::common::Coordinates;

pub const FALLBACK_LATITUDE: f64 = 34.0522;
pub const FALLBACK_LONGITUDE: f64 = -118.2437;
pub const FALLBACK_TIME_ZONE: &str = "America/Los_Angeles";

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationAccuracy {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Ip,
    Fallback,
}

/// Where the user is, and how that was determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub country: String,
    pub country_code: String,
    pub time_zone: String,
    pub accuracy: LocationAccuracy,
    pub source: LocationSource,
}

impl LocationData {
    /// Los Angeles, used when nothing better is available.
    pub fn fallback() -> Self {
        Self {
            latitude: FALLBACK_LATITUDE,
            longitude: FALLBACK_LONGITUDE,
            city: "Los Angeles".into(),
            country: "United States".into(),
            country_code: "US".into(),
            time_zone: FALLBACK_TIME_ZONE.into(),
            accuracy: LocationAccuracy::Low,
            source: LocationSource::Fallback,
        }
    }

    /// A fix reported by the device itself.
    pub fn from_device(fix: Coordinates, time_zone: Option<String>) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            city: "Current Location".into(),
            country: UNKNOWN.into(),
            country_code: UNKNOWN.into(),
            time_zone: time_zone.unwrap_or_else(|| UNKNOWN.into()),
            accuracy: LocationAccuracy::High,
            source: LocationSource::Gps,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A coordinate that may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LooseCoordinate(pub Option<f64>);

impl<'de> Deserialize<'de> for LooseCoordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
            Other(serde::de::IgnoredAny),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Some(n),
            Raw::Text(s) => s.trim().parse::<f64>().ok(),
            Raw::Other(_) => None,
        };
        Ok(LooseCoordinate(parsed.filter(|n| n.is_finite())))
    }
}

/// Body of the IP lookup edge function.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpLocationResponse {
    #[serde(default)]
    pub latitude: Option<LooseCoordinate>,
    #[serde(default)]
    pub longitude: Option<LooseCoordinate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl IpLocationResponse {
    /// Both coordinates, if present, numeric and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.latitude.and_then(|c| c.0)?;
        let longitude = self.longitude.and_then(|c| c.0)?;
        Some(Coordinates::new(latitude, longitude)).filter(Coordinates::is_valid)
    }

    /// An IP-derived location, or `None` when the coordinates are unusable.
    pub fn into_location(self) -> Option<LocationData> {
        let coordinates = self.coordinates()?;
        let or_unknown = |value: Option<String>| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.into())
        };

        Some(LocationData {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            city: or_unknown(self.city),
            country: or_unknown(self.country),
            country_code: or_unknown(self.country_code),
            time_zone: or_unknown(self.time_zone),
            accuracy: LocationAccuracy::Medium,
            source: LocationSource::Ip,
        })
    }
}
