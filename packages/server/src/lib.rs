// Kindr spatial browsing - API core
//
// Validates map viewport and radius queries, calls the backend's spatial
// procedures, reshapes their rows and clusters them for map rendering.

pub mod common;
pub mod config;
pub mod domains;
pub mod server;
pub mod testing;

pub use config::*;
