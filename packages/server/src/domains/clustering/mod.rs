pub mod index;
pub mod service;

pub use index::{ClusterIndex, ClusterSummary, GeoPoint, IndexFeature, IndexOptions};
pub use service::*;
