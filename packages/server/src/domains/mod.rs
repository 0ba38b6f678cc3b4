// Business domains
pub mod clustering;
pub mod location;
pub mod requests;
