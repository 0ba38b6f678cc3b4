//! Hierarchical greedy point clustering for web maps.
//!
//! Points are projected onto the unit Web-Mercator square. Starting from the
//! leaf level (`max_zoom + 1`) each zoom level greedily merges every point with
//! its unprocessed neighbours inside `radius / (extent * 2^zoom)`, producing the
//! input for the next-lower zoom. Every level keeps its own R-tree so viewport
//! and neighbour queries stay logarithmic.
//!
//! Cluster ids encode where the cluster was formed:
//! `(origin_index << 5) + (zoom + 1) + point_count`, so a cluster can be traced
//! back to its children without a side table.

use std::f64::consts::PI;

use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use crate::common::ClusterError;

/// Zoom is packed into five bits of a cluster id.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

const UNPROCESSED: u8 = u8::MAX;

type Entry = GeomWithData<[f64; 2], usize>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Minimum number of points that form a cluster.
    pub min_points: usize,
    /// Cluster radius in pixels.
    pub radius: f64,
    /// Tile extent the radius is measured against.
    pub extent: f64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            radius: 40.0,
            extent: 512.0,
        }
    }
}

/// A point handed to the index with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint<T> {
    pub longitude: f64,
    pub latitude: f64,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub id: usize,
    pub longitude: f64,
    pub latitude: f64,
    pub point_count: usize,
    pub point_count_abbreviated: String,
}

/// What a viewport or children query yields.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexFeature<'a, T> {
    Cluster(ClusterSummary),
    Point(&'a GeoPoint<T>),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    x: f64,
    y: f64,
    /// Zoom at which this node was last visited; `UNPROCESSED` until then.
    zoom: u8,
    /// Point index for leaves, encoded cluster id for clusters.
    id: usize,
    parent_id: Option<usize>,
    num_points: usize,
}

impl Node {
    fn fresh(self) -> Self {
        Self {
            zoom: UNPROCESSED,
            parent_id: None,
            ..self
        }
    }
}

struct Level {
    nodes: Vec<Node>,
    tree: RTree<Entry>,
}

impl Level {
    fn new(nodes: Vec<Node>) -> Self {
        let entries = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| GeomWithData::new([n.x, n.y], i))
            .collect();
        Self {
            nodes,
            tree: RTree::bulk_load(entries),
        }
    }

    fn within(&self, x: f64, y: f64, r: f64) -> Vec<usize> {
        self.tree
            .locate_within_distance([x, y], r * r)
            .map(|e| e.data)
            .collect()
    }

    fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|e| e.data)
            .collect()
    }
}

/// Static clustering index over a set of points, rebuilt on every [`ClusterIndex::load`].
pub struct ClusterIndex<T> {
    options: IndexOptions,
    points: Vec<GeoPoint<T>>,
    /// Indexed by zoom, `min_zoom..=max_zoom + 1` populated.
    levels: Vec<Option<Level>>,
}

impl<T> ClusterIndex<T> {
    pub fn new(options: IndexOptions) -> Self {
        let max_zoom = options.max_zoom.min(MAX_SUPPORTED_ZOOM);
        let options = IndexOptions {
            max_zoom,
            min_zoom: options.min_zoom.min(max_zoom),
            ..options
        };
        Self {
            options,
            points: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GeoPoint<T>] {
        &self.points
    }

    pub fn into_points(self) -> Vec<GeoPoint<T>> {
        self.points
    }

    /// Replace the indexed points and rebuild every zoom level.
    pub fn load(&mut self, points: Vec<GeoPoint<T>>) {
        self.points = points;

        let min_zoom = self.options.min_zoom as usize;
        let max_zoom = self.options.max_zoom as usize;

        let leaves = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                x: lng_x(p.longitude),
                y: lat_y(p.latitude),
                zoom: UNPROCESSED,
                id: i,
                parent_id: None,
                num_points: 1,
            })
            .collect();

        self.levels = (0..=max_zoom + 1).map(|_| None).collect();

        let mut current = Level::new(leaves);
        for zoom in (min_zoom..=max_zoom).rev() {
            let next = self.cluster(&mut current, zoom as u8);
            self.levels[zoom + 1] = Some(current);
            current = Level::new(next);
        }
        self.levels[min_zoom] = Some(current);
    }

    /// Drop all points.
    pub fn clear(&mut self) {
        self.points.clear();
        self.levels.clear();
    }

    fn cluster(&self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let r = self.options.radius / (self.options.extent * 2f64.powi(zoom as i32));
        let total = self.points.len();
        let mut next = Vec::new();

        for i in 0..level.nodes.len() {
            if level.nodes[i].zoom <= zoom {
                continue;
            }
            level.nodes[i].zoom = zoom;

            let Node {
                x,
                y,
                num_points: origin_count,
                ..
            } = level.nodes[i];
            let neighbors = level.within(x, y, r);

            let num_points = origin_count
                + neighbors
                    .iter()
                    .map(|&j| &level.nodes[j])
                    .filter(|n| n.zoom > zoom)
                    .map(|n| n.num_points)
                    .sum::<usize>();

            if num_points > origin_count && num_points >= self.options.min_points {
                let mut wx = x * origin_count as f64;
                let mut wy = y * origin_count as f64;
                let id = (i << 5) + (zoom as usize + 1) + total;

                for &j in &neighbors {
                    let neighbor = &mut level.nodes[j];
                    if neighbor.zoom <= zoom {
                        continue;
                    }
                    neighbor.zoom = zoom;
                    neighbor.parent_id = Some(id);
                    wx += neighbor.x * neighbor.num_points as f64;
                    wy += neighbor.y * neighbor.num_points as f64;
                }

                level.nodes[i].parent_id = Some(id);
                next.push(Node {
                    x: wx / num_points as f64,
                    y: wy / num_points as f64,
                    zoom: UNPROCESSED,
                    id,
                    parent_id: None,
                    num_points,
                });
            } else {
                next.push(level.nodes[i].fresh());

                if num_points > 1 {
                    for &j in &neighbors {
                        let neighbor = &mut level.nodes[j];
                        if neighbor.zoom <= zoom {
                            continue;
                        }
                        neighbor.zoom = zoom;
                        next.push(neighbor.fresh());
                    }
                }
            }
        }

        next
    }

    fn level(&self, zoom: usize) -> Option<&Level> {
        self.levels.get(zoom).and_then(Option::as_ref)
    }

    fn limit_zoom(&self, zoom: f64) -> usize {
        let min = self.options.min_zoom as f64;
        let max = self.options.max_zoom as f64 + 1.0;
        let z = if zoom.is_nan() { min } else { zoom.floor() };
        z.clamp(min, max) as usize
    }

    fn feature(&self, node: &Node) -> IndexFeature<'_, T> {
        if node.num_points > 1 {
            IndexFeature::Cluster(ClusterSummary {
                id: node.id,
                longitude: x_lng(node.x),
                latitude: y_lat(node.y),
                point_count: node.num_points,
                point_count_abbreviated: abbreviate_count(node.num_points),
            })
        } else {
            IndexFeature::Point(&self.points[node.id])
        }
    }

    /// Clusters and points inside `bbox = [west, south, east, north]` at `zoom`.
    pub fn clusters(&self, bbox: [f64; 4], zoom: f64) -> Vec<IndexFeature<'_, T>> {
        let [west, south, east, north] = bbox;

        let mut min_lng = normalize_lng(west);
        let min_lat = south.clamp(-90.0, 90.0);
        let mut max_lng = if east == 180.0 {
            180.0
        } else {
            normalize_lng(east)
        };
        let max_lat = north.clamp(-90.0, 90.0);

        if east - west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut features = self.clusters([min_lng, min_lat, 180.0, max_lat], zoom);
            features.extend(self.clusters([-180.0, min_lat, max_lng, max_lat], zoom));
            return features;
        }

        let Some(level) = self.level(self.limit_zoom(zoom)) else {
            return Vec::new();
        };

        level
            .range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
            .into_iter()
            .map(|i| self.feature(&level.nodes[i]))
            .collect()
    }

    fn decode(&self, cluster_id: usize) -> Result<(usize, usize), ClusterError> {
        let offset = cluster_id
            .checked_sub(self.points.len())
            .ok_or(ClusterError::NotFound(cluster_id))?;
        let origin_zoom = offset % 32;
        if origin_zoom == 0 {
            return Err(ClusterError::NotFound(cluster_id));
        }
        Ok((offset >> 5, origin_zoom))
    }

    /// Direct children of a cluster, one zoom level down.
    pub fn children(&self, cluster_id: usize) -> Result<Vec<IndexFeature<'_, T>>, ClusterError> {
        let (origin_index, origin_zoom) = self.decode(cluster_id)?;
        let level = self
            .level(origin_zoom)
            .ok_or(ClusterError::NotFound(cluster_id))?;
        let origin = level
            .nodes
            .get(origin_index)
            .ok_or(ClusterError::NotFound(cluster_id))?;

        let r = self.options.radius
            / (self.options.extent * 2f64.powi(origin_zoom as i32 - 1));

        let children: Vec<_> = level
            .within(origin.x, origin.y, r)
            .into_iter()
            .map(|j| &level.nodes[j])
            .filter(|n| n.parent_id == Some(cluster_id))
            .map(|n| self.feature(n))
            .collect();

        if children.is_empty() {
            return Err(ClusterError::NotFound(cluster_id));
        }
        Ok(children)
    }

    /// Original points under a cluster, paged by `limit` and `offset`.
    pub fn leaves(
        &self,
        cluster_id: usize,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<&GeoPoint<T>>, ClusterError> {
        let mut leaves = Vec::new();
        if limit > 0 {
            self.append_leaves(&mut leaves, cluster_id, limit, offset, 0)?;
        }
        Ok(leaves)
    }

    fn append_leaves<'a>(
        &'a self,
        out: &mut Vec<&'a GeoPoint<T>>,
        cluster_id: usize,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize, ClusterError> {
        for child in self.children(cluster_id)? {
            match child {
                IndexFeature::Cluster(cluster) => {
                    if skipped + cluster.point_count <= offset {
                        skipped += cluster.point_count;
                    } else {
                        skipped = self.append_leaves(out, cluster.id, limit, offset, skipped)?;
                    }
                }
                IndexFeature::Point(point) => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(point);
                    }
                }
            }

            if out.len() == limit {
                break;
            }
        }

        Ok(skipped)
    }

    /// Lowest zoom at which the cluster breaks apart into more than one child.
    pub fn expansion_zoom(&self, cluster_id: usize) -> Result<usize, ClusterError> {
        let (_, origin_zoom) = self.decode(cluster_id)?;
        let mut children = self.children(cluster_id)?;
        let mut expansion_zoom = origin_zoom;

        while expansion_zoom <= self.options.max_zoom as usize {
            let only = match children.as_slice() {
                [IndexFeature::Cluster(only)] => only.id,
                _ => break,
            };
            children = self.children(only)?;
            expansion_zoom += 1;
        }

        Ok(expansion_zoom)
    }
}

/// Short label for a cluster's size, e.g. `1.3k`.
pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

fn normalize_lng(lng: f64) -> f64 {
    ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / PI - 90.0
}
