// HTTP middleware
pub mod error_recorder;
pub mod ip_extractor;

pub use error_recorder::*;
pub use ip_extractor::*;
