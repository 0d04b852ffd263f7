pub mod jwt;
pub mod location;
