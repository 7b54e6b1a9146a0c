pub mod capture_provider;
pub mod focus;
pub mod keep_alive;
pub mod permission;
