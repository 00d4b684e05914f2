//! Display formatting helpers.

pub mod format;

pub use format::{format_coordinate, format_distance_km, format_optional_distance};
