pub mod converter;
pub mod encoder;
pub mod gain;
pub mod loudness;
pub mod pipeline;
pub mod stats;
