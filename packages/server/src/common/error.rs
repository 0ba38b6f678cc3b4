//! Typed errors for the spatial domain.

use supabase_client::{ErrorCode, SupabaseError};
use thiserror::Error;

pub type SpatialResult<T> = std::result::Result<T, SpatialError>;

/// Coordinate and query-parameter range violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid bounds: north must be greater than south")]
    NorthNotAboveSouth,

    #[error("Invalid bounds: east must be greater than west")]
    EastNotAfterWest,

    #[error("Invalid latitude bounds: must be between -90 and 90")]
    LatitudeBounds,

    #[error("Invalid longitude bounds: must be between -180 and 180")]
    LongitudeBounds,

    #[error("Invalid latitude: must be between -90 and 90")]
    Latitude,

    #[error("Invalid longitude: must be between -180 and 180")]
    Longitude,

    #[error("Invalid radius: must be between 1 and 50000 meters")]
    Radius,

    #[error("Invalid parameter {name}: {reason}")]
    Parameter { name: &'static str, reason: String },
}

/// Errors from the clustering index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    #[error("No cluster with the specified id: {0}")]
    NotFound(usize),
}

/// Anything a spatial operation can fail with.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Backend(#[from] SupabaseError),

    #[error("Failed to decode rows from {function}: {source}")]
    Decode {
        function: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SpatialError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SpatialError::Validation(_) => ErrorCode::ValidationError,
            SpatialError::Cluster(_) => ErrorCode::NotFound,
            SpatialError::Backend(e) => e.code(),
            SpatialError::Decode { .. } => ErrorCode::UnknownError,
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            SpatialError::Backend(e) => e.details().map(String::from),
            SpatialError::Decode { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}
