//! Coordinate persistence.
//!
//! `CacheManager` keeps the last device fix (fresh for 10 minutes), the
//! manually entered fix (no expiry) and per-target failure counters in a
//! `KeyValueStore`. Values are JSON strings, so a store written by one
//! process can be read by the next.

pub mod error;
pub mod manager;
pub mod store;

pub use error::StoreError;
pub use manager::{CacheManager, CacheSummary, CACHE_TTL_MS};
pub use store::{FileStore, KeyValueStore, MemoryStore};
