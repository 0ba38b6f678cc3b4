pub mod client_ip;
pub mod ip_locator;
pub mod models;
pub mod service;

pub use client_ip::{client_ip, is_public_ip};
pub use ip_locator::{IpApiLocator, IpLocator, LocatorError, DEFAULT_IP_GEOLOCATION_URL};
pub use models::*;
pub use service::{LocationService, USER_LOCATION_FUNCTION};
