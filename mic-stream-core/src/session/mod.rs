pub mod capture;
pub mod lifecycle;
pub mod recorder;
