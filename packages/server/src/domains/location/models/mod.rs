pub mod location_data;

pub use location_data::*;
