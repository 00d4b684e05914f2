//! Data models for the location subsystem.
//!
//! - `Coordinate`: latitude/longitude value type
//! - `CachedLocation`, `ManualLocation`: persisted fixes
//! - `Place`, `RankedPlace`: distance-dependent targets

pub mod coordinate;
pub mod place;

pub use coordinate::{age_display, CachedLocation, Coordinate, ManualLocation};
pub(crate) use coordinate::StoredFix;
pub use place::{Place, RankedPlace};
