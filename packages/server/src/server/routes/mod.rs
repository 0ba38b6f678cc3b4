// HTTP routes
pub mod clusters;
pub mod errors;
pub mod health;
pub mod location;
pub mod requests;

pub use clusters::*;
pub use errors::*;
pub use health::*;
pub use location::*;
pub use requests::*;
