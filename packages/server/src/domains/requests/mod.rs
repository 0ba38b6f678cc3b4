pub mod backend;
pub mod models;
pub mod spatial_queries;

pub use backend::SpatialBackend;
pub use models::{
    DurationEstimate, RequestCategory, RequestRow, RequestStatus, RequestUser,
    RequestWithDistance,
};
pub use spatial_queries::{
    SpatialQueryOptions, SpatialQueryService, BOUNDS_PROCEDURE, DEFAULT_LIMIT, RADIUS_PROCEDURE,
    VALIDATE_GEOMETRIES_PROCEDURE,
};
