//! Map clustering over loaded requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::ValidationError;
use crate::domains::requests::RequestWithDistance;

use super::index::{ClusterIndex, GeoPoint, IndexFeature, IndexOptions, MAX_SUPPORTED_ZOOM};

/// Bounds used for per-zoom statistics. Web-Mercator stops short of the poles.
const STATS_BBOX: [f64; 4] = [-180.0, -85.0, 180.0, 85.0];

/// Points required to form a cluster.
const MIN_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Cluster radius in pixels.
    pub radius: f64,
    /// Renderer hint: most markers a cluster should spiderfy into.
    pub max_points_per_cluster: usize,
    /// Renderer hint: minimum pixel spacing between markers.
    pub min_distance: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 16,
            radius: 60.0,
            max_points_per_cluster: 100,
            min_distance: 40.0,
        }
    }
}

/// Partial update for [`ClusterOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterOptionsUpdate {
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub radius: Option<f64>,
    pub max_points_per_cluster: Option<usize>,
    pub min_distance: Option<f64>,
}

impl ClusterOptions {
    pub fn merged(self, update: ClusterOptionsUpdate) -> Self {
        Self {
            min_zoom: update.min_zoom.unwrap_or(self.min_zoom),
            max_zoom: update.max_zoom.unwrap_or(self.max_zoom),
            radius: update.radius.unwrap_or(self.radius),
            max_points_per_cluster: update
                .max_points_per_cluster
                .unwrap_or(self.max_points_per_cluster),
            min_distance: update.min_distance.unwrap_or(self.min_distance),
        }
    }

    /// Zoom range must be ordered and within what the index supports; radius positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_zoom > self.max_zoom {
            return Err(ValidationError::Parameter {
                name: "min_zoom",
                reason: format!(
                    "min_zoom ({}) must not exceed max_zoom ({})",
                    self.min_zoom, self.max_zoom
                ),
            });
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(ValidationError::Parameter {
                name: "max_zoom",
                reason: format!("max_zoom must be at most {MAX_SUPPORTED_ZOOM}"),
            });
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ValidationError::Parameter {
                name: "radius",
                reason: "radius must be a positive number".into(),
            });
        }
        Ok(())
    }

    fn index_options(&self) -> IndexOptions {
        IndexOptions {
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            min_points: MIN_POINTS,
            radius: self.radius,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterColor {
    pub background: &'static str,
    pub text: &'static str,
}

/// Styling for a cluster marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMarker {
    pub label: String,
    pub size: u32,
    pub background: &'static str,
    pub text: &'static str,
}

impl ClusterMarker {
    pub fn for_count(count: usize) -> Self {
        let color = cluster_color(count);
        Self {
            label: format_cluster_count(count),
            size: cluster_size(count),
            background: color.background,
            text: color.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

impl PointGeometry {
    fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point",
            coordinates: [longitude, latitude],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProperties {
    pub cluster: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_count_abbreviated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<ClusterMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestWithDistance>,
}

/// GeoJSON feature for either a cluster or a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterFeature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: ClusterProperties,
    pub geometry: PointGeometry,
}

impl ClusterFeature {
    pub fn is_cluster(&self) -> bool {
        self.properties.cluster
    }

    fn from_index(feature: IndexFeature<'_, RequestWithDistance>) -> Self {
        match feature {
            IndexFeature::Cluster(c) => Self {
                kind: "Feature",
                properties: ClusterProperties {
                    cluster: true,
                    cluster_id: Some(c.id),
                    point_count: Some(c.point_count),
                    point_count_abbreviated: Some(c.point_count_abbreviated),
                    marker: Some(ClusterMarker::for_count(c.point_count)),
                    request: None,
                },
                geometry: PointGeometry::new(c.longitude, c.latitude),
            },
            IndexFeature::Point(p) => Self {
                kind: "Feature",
                properties: ClusterProperties {
                    cluster: false,
                    cluster_id: None,
                    point_count: None,
                    point_count_abbreviated: None,
                    marker: None,
                    request: Some(p.data.clone()),
                },
                geometry: PointGeometry::new(p.longitude, p.latitude),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterStats {
    pub total_points: usize,
    pub clusters_at_zoom: BTreeMap<u8, usize>,
    pub options: ClusterOptions,
}

/// Clusters requests for whatever viewport the map is showing.
pub struct MapClusteringService {
    options: ClusterOptions,
    index: ClusterIndex<RequestWithDistance>,
}

impl Default for MapClusteringService {
    fn default() -> Self {
        Self::new(ClusterOptions::default())
    }
}

impl MapClusteringService {
    pub fn new(options: ClusterOptions) -> Self {
        Self {
            index: ClusterIndex::new(options.index_options()),
            options,
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn total_points(&self) -> usize {
        self.index.len()
    }

    /// Requests with a usable location, as index points.
    fn requests_to_points(requests: Vec<RequestWithDistance>) -> Vec<GeoPoint<RequestWithDistance>> {
        requests
            .into_iter()
            .filter_map(|request| {
                let location = request.location.filter(|l| l.is_valid())?;
                Some(GeoPoint {
                    longitude: location.longitude,
                    latitude: location.latitude,
                    data: request,
                })
            })
            .collect()
    }

    /// Replace the clustered set. Requests without a valid location are skipped.
    pub fn load_requests(&mut self, requests: Vec<RequestWithDistance>) {
        info!(count = requests.len(), "Loading requests into clustering engine");

        let points = Self::requests_to_points(requests);
        self.index.load(points);

        info!(valid = self.index.len(), "Loaded valid points for clustering");
    }

    /// Clusters and single requests inside `bbox = [west, south, east, north]`.
    pub fn get_clusters(&self, bbox: [f64; 4], zoom: f64) -> Vec<ClusterFeature> {
        if self.index.is_empty() {
            return Vec::new();
        }

        let zoom = self.clamp_zoom(zoom);
        debug!(zoom, ?bbox, "Getting clusters");

        let features: Vec<ClusterFeature> = self
            .index
            .clusters(bbox, zoom as f64)
            .into_iter()
            .map(ClusterFeature::from_index)
            .collect();

        debug!(count = features.len(), zoom, "Found clusters/points");
        features
    }

    fn clamp_zoom(&self, zoom: f64) -> u8 {
        if zoom.is_nan() {
            return self.options.min_zoom;
        }
        zoom.floor()
            .clamp(self.options.min_zoom as f64, self.options.max_zoom as f64) as u8
    }

    /// Every request under a cluster. Unknown ids yield an empty list.
    pub fn get_cluster_expansion_points(&self, cluster_id: usize) -> Vec<RequestWithDistance> {
        match self.index.leaves(cluster_id, usize::MAX, 0) {
            Ok(leaves) => leaves.into_iter().map(|p| p.data.clone()).collect(),
            Err(e) => {
                warn!(cluster_id, error = %e, "Error getting cluster expansion points");
                Vec::new()
            }
        }
    }

    /// Zoom at which a cluster splits. Unknown ids fall back to `max_zoom`.
    pub fn get_cluster_expansion_zoom(&self, cluster_id: usize) -> usize {
        match self.index.expansion_zoom(cluster_id) {
            Ok(zoom) => zoom,
            Err(e) => {
                warn!(cluster_id, error = %e, "Error getting cluster expansion zoom");
                self.options.max_zoom as usize
            }
        }
    }

    pub fn should_cluster(&self, zoom: f64) -> bool {
        zoom <= self.options.max_zoom as f64
    }

    pub fn get_stats(&self) -> ClusterStats {
        let clusters_at_zoom = (self.options.min_zoom..=self.options.max_zoom)
            .map(|zoom| (zoom, self.index.clusters(STATS_BBOX, zoom as f64).len()))
            .collect();

        ClusterStats {
            total_points: self.index.len(),
            clusters_at_zoom,
            options: self.options,
        }
    }

    /// Apply new options and re-cluster the points already loaded.
    ///
    /// Invalid merged options are rejected and the current ones kept.
    pub fn update_options(
        &mut self,
        update: ClusterOptionsUpdate,
    ) -> Result<(), ValidationError> {
        let options = self.options.merged(update);
        options.validate()?;
        self.options = options;

        let rebuilt = ClusterIndex::new(self.options.index_options());
        let points = std::mem::replace(&mut self.index, rebuilt).into_points();
        if !points.is_empty() {
            self.index.load(points);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }
}

/// Marker label for a cluster count, truncating rather than rounding.
pub fn format_cluster_count(count: usize) -> String {
    if count < 1000 {
        count.to_string()
    } else if count < 10_000 {
        let tenths = count / 100;
        if tenths % 10 == 0 {
            format!("{}k", tenths / 10)
        } else {
            format!("{}.{}k", tenths / 10, tenths % 10)
        }
    } else {
        format!("{}k", count / 1000)
    }
}

pub fn cluster_color(count: usize) -> ClusterColor {
    let background = match count {
        0..=9 => "#0ea5e9",
        10..=24 => "#22c55e",
        25..=49 => "#f97316",
        _ => "#ef4444",
    };
    ClusterColor {
        background,
        text: "#ffffff",
    }
}

/// Marker diameter in pixels.
pub fn cluster_size(count: usize) -> u32 {
    match count {
        0..=9 => 40,
        10..=24 => 50,
        25..=49 => 60,
        _ => 70,
    }
}
