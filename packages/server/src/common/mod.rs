// Common types and utilities shared across the application

pub mod error;
pub mod error_log;
pub mod geo;

pub use error::{ClusterError, SpatialError, SpatialResult, ValidationError};
pub use error_log::{ErrorLog, ErrorRecord};
pub use geo::*;
