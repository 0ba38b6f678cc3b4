//! Coordinates, map bounds, range checks and distance helpers.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Meters in a statute mile.
pub const METERS_PER_MILE: f64 = 1609.34;

/// Largest radius the backend procedures accept.
pub const MAX_RADIUS_METERS: f64 = 50_000.0;

const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Approximate miles per degree of latitude.
const MILES_PER_DEGREE: f64 = 69.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng")]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        valid_latitude(self.latitude) && valid_longitude(self.longitude)
    }
}

/// Map viewport edges in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl MapBounds {
    /// `[west, south, east, north]`, the order the clustering index expects.
    pub fn to_bbox(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// Center point plus radius in miles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

/// Anything carrying a point, so it can be filtered by distance.
pub trait Located {
    fn coordinates(&self) -> Option<Coordinates>;
}

fn valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

fn valid_longitude(lng: f64) -> bool {
    lng.is_finite() && (-180.0..=180.0).contains(&lng)
}

/// Check a viewport. A west edge above the east edge is accepted only when the
/// gap is at least 180 degrees, which is how an antimeridian-crossing viewport looks.
pub fn validate_bounds(bounds: &MapBounds) -> Result<(), ValidationError> {
    let MapBounds {
        north,
        south,
        east,
        west,
    } = *bounds;

    if north <= south {
        return Err(ValidationError::NorthNotAboveSouth);
    }

    if east <= west && (east - west).abs() < 180.0 {
        return Err(ValidationError::EastNotAfterWest);
    }

    if !valid_latitude(north) || !valid_latitude(south) {
        return Err(ValidationError::LatitudeBounds);
    }

    if !valid_longitude(east) || !valid_longitude(west) {
        return Err(ValidationError::LongitudeBounds);
    }

    Ok(())
}

pub fn validate_radius(lat: f64, lng: f64, radius_meters: f64) -> Result<(), ValidationError> {
    if !valid_latitude(lat) {
        return Err(ValidationError::Latitude);
    }

    if !valid_longitude(lng) {
        return Err(ValidationError::Longitude);
    }

    if !radius_meters.is_finite() || radius_meters <= 0.0 || radius_meters > MAX_RADIUS_METERS {
        return Err(ValidationError::Radius);
    }

    Ok(())
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

/// Approximate bounding box around a center point. North and south are clamped to the
/// poles; east and west are left unnormalized.
pub fn bounds_from_radius(center: Coordinates, radius_miles: f64) -> MapBounds {
    let lat_offset = radius_miles / MILES_PER_DEGREE;
    let lng_offset = radius_miles / (MILES_PER_DEGREE * center.latitude.to_radians().cos());

    MapBounds {
        north: (center.latitude + lat_offset).min(90.0),
        south: (center.latitude - lat_offset).max(-90.0),
        east: center.longitude + lng_offset,
        west: center.longitude - lng_offset,
    }
}

/// Inclusive containment test. Handles viewports crossing the antimeridian.
pub fn is_point_in_bounds(lat: f64, lng: f64, bounds: &MapBounds) -> bool {
    if lat < bounds.south || lat > bounds.north {
        return false;
    }

    if bounds.west > bounds.east {
        lng >= bounds.west || lng <= bounds.east
    } else {
        lng >= bounds.west && lng <= bounds.east
    }
}

/// Great-circle distance in miles (haversine).
pub fn distance_miles(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Keep items within `filter.radius` miles of the filter center. Items without a point are dropped.
pub fn filter_by_location<T: Located>(items: Vec<T>, filter: &LocationFilter) -> Vec<T> {
    let center = Coordinates::new(filter.latitude, filter.longitude);
    items
        .into_iter()
        .filter(|item| {
            item.coordinates()
                .map(|c| distance_miles(center, c) <= filter.radius)
                .unwrap_or(false)
        })
        .collect()
}

/// Human-readable coordinate pair, used where no reverse geocoder is available.
pub fn format_coordinates(lat: f64, lng: f64) -> String {
    format!("{:.4}, {:.4}", lat, lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nyc_bounds() -> MapBounds {
        MapBounds {
            north: 40.7128,
            south: 40.7000,
            east: -74.0000,
            west: -74.0200,
        }
    }

    #[test]
    fn test_validate_bounds_accepts_normal_viewport() {
        assert!(validate_bounds(&nyc_bounds()).is_ok());
    }

    #[test]
    fn test_validate_bounds_rejects_out_of_range() {
        let bounds = MapBounds {
            north: 100.0,
            ..nyc_bounds()
        };
        assert_eq!(validate_bounds(&bounds), Err(ValidationError::LatitudeBounds));

        let bounds = MapBounds {
            east: 200.0,
            ..nyc_bounds()
        };
        assert_eq!(validate_bounds(&bounds), Err(ValidationError::LongitudeBounds));
    }

    #[test]
    fn test_validate_bounds_rejects_inverted_edges() {
        let bounds = MapBounds {
            north: 40.7000,
            south: 40.7128,
            ..nyc_bounds()
        };
        assert_eq!(
            validate_bounds(&bounds),
            Err(ValidationError::NorthNotAboveSouth)
        );

        let bounds = MapBounds {
            east: -74.05,
            west: -74.0,
            ..nyc_bounds()
        };
        assert_eq!(validate_bounds(&bounds), Err(ValidationError::EastNotAfterWest));

        let degenerate = MapBounds {
            east: -74.0,
            west: -74.0,
            ..nyc_bounds()
        };
        assert_eq!(
            validate_bounds(&degenerate),
            Err(ValidationError::EastNotAfterWest)
        );
    }

    #[test]
    fn test_validate_bounds_allows_antimeridian_crossing() {
        let pacific = MapBounds {
            north: 10.0,
            south: -10.0,
            east: -170.0,
            west: 170.0,
        };
        assert!(validate_bounds(&pacific).is_ok());
    }

    #[test]
    fn test_validate_bounds_rejects_nan() {
        let bounds = MapBounds {
            east: f64::NAN,
            ..nyc_bounds()
        };
        assert_eq!(validate_bounds(&bounds), Err(ValidationError::LongitudeBounds));
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(40.7128, -74.0060, 1000.0).is_ok());
        assert!(validate_radius(40.7128, -74.0060, MAX_RADIUS_METERS).is_ok());
        assert_eq!(
            validate_radius(100.0, -74.0060, 1000.0),
            Err(ValidationError::Latitude)
        );
        assert_eq!(
            validate_radius(40.7128, 200.0, 1000.0),
            Err(ValidationError::Longitude)
        );
        assert_eq!(
            validate_radius(40.7128, -74.0060, 0.0),
            Err(ValidationError::Radius)
        );
        assert_eq!(
            validate_radius(40.7128, -74.0060, 60_000.0),
            Err(ValidationError::Radius)
        );
    }

    #[test]
    fn test_unit_conversion() {
        assert!((miles_to_meters(1.0) - 1609.34).abs() < 1e-9);
        assert!((miles_to_meters(5.0) - 8046.7).abs() < 0.1);
        assert!((meters_to_miles(1609.34) - 1.0).abs() < 1e-9);
        assert!((meters_to_miles(8046.7) - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_bounds_from_radius_surrounds_center() {
        let center = Coordinates::new(40.7128, -74.0060);
        let bounds = bounds_from_radius(center, 1.0);

        assert!(bounds.north > center.latitude);
        assert!(bounds.south < center.latitude);
        assert!(bounds.east > center.longitude);
        assert!(bounds.west < center.longitude);
        assert!((bounds.north - center.latitude - 1.0 / 69.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_from_radius_clamps_at_pole() {
        let bounds = bounds_from_radius(Coordinates::new(89.9, 0.0), 100.0);
        assert_eq!(bounds.north, 90.0);
    }

    #[test]
    fn test_is_point_in_bounds() {
        let bounds = MapBounds {
            north: 40.8,
            south: 40.7,
            east: -74.0,
            west: -74.1,
        };
        assert!(is_point_in_bounds(40.75, -74.05, &bounds));
        assert!(is_point_in_bounds(40.8, -74.0, &bounds));
        assert!(!is_point_in_bounds(40.9, -74.05, &bounds));
        assert!(!is_point_in_bounds(40.75, -73.9, &bounds));
    }

    #[test]
    fn test_is_point_in_bounds_across_dateline() {
        let bounds = MapBounds {
            north: 10.0,
            south: -10.0,
            east: -170.0,
            west: 170.0,
        };
        assert!(is_point_in_bounds(0.0, 175.0, &bounds));
        assert!(is_point_in_bounds(0.0, -175.0, &bounds));
        assert!(!is_point_in_bounds(0.0, 0.0, &bounds));
    }

    #[test]
    fn test_distance_miles() {
        // Los Angeles to San Francisco is roughly 347 miles
        let la = Coordinates::new(34.0522, -118.2437);
        let sf = Coordinates::new(37.7749, -122.4194);
        let d = distance_miles(la, sf);
        assert!(d > 340.0 && d < 355.0, "got {d}");

        assert!(distance_miles(la, la) < 1e-9);
    }

    struct Pin(Option<Coordinates>);

    impl Located for Pin {
        fn coordinates(&self) -> Option<Coordinates> {
            self.0
        }
    }

    #[test]
    fn test_filter_by_location() {
        let filter = LocationFilter {
            latitude: 34.0522,
            longitude: -118.2437,
            radius: 10.0,
        };
        let pins = vec![
            Pin(Some(Coordinates::new(34.06, -118.25))),
            Pin(Some(Coordinates::new(37.7749, -122.4194))),
            Pin(None),
        ];

        let kept = filter_by_location(pins, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, Some(Coordinates::new(34.06, -118.25)));
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(format_coordinates(34.05223, -118.24368), "34.0522, -118.2437");
    }

    #[test]
    fn test_coordinates_accept_short_keys() {
        let c: Coordinates = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
        assert_eq!(c, Coordinates::new(1.5, 2.5));
        assert!(c.is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
    }
}
