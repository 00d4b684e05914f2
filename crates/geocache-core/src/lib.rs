//! Location resolution and coordinate caching.
//!
//! This crate resolves "where is the user" for distance-dependent views:
//!
//! - `resolver`: the `LocationResolver` state machine and its policies
//! - `cache`: `CacheManager` with the 10-minute device fix, the manual fix
//!   and per-target fail counters over a `KeyValueStore`
//! - `sensor`: the `LocationSensor` seam and a scripted implementation
//! - `distance`: haversine distances and nearest-first ranking
//! - `config`: persisted settings

pub mod cache;
pub mod clock;
pub mod config;
pub mod distance;
pub mod error;
pub mod models;
pub mod resolver;
pub mod sensor;
pub mod utils;

pub use cache::{CacheManager, FileStore, KeyValueStore, MemoryStore, StoreError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use distance::{distance_km, haversine_km, rank_nearest};
pub use error::LocationError;
pub use models::{CachedLocation, Coordinate, ManualLocation, Place, RankedPlace};
pub use resolver::{
    FailurePolicy, LocationResolver, LocationSnapshot, PendingLocation, PolicyKind,
    ResolutionState, ResolverPolicy,
};
pub use sensor::{LocationSensor, ScriptedSensor, SensorError, SensorOptions};
