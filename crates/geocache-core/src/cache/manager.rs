use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{KeyValueStore, StoreError};
use crate::clock::Clock;
use crate::models::{CachedLocation, Coordinate, ManualLocation, StoredFix};

/// A device fix is reused for 10 minutes.
pub const CACHE_TTL_MS: i64 = 10 * 60 * 1000;

const CACHED_FIX_KEY: &str = "userCoordsCache";
const MANUAL_FIX_KEY: &str = "userManualCoords";
const FAIL_COUNT_PREFIX: &str = "distanceFailCount:";

/// Coordinate cache on top of a key-value store.
///
/// Holds the last device fix (expires after [`CACHE_TTL_MS`]), the manual
/// fix (never expires) and a failure counter per distance target.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn fail_count_key(target_id: &str) -> String {
        format!("{}{}", FAIL_COUNT_PREFIX, target_id)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Malformed store entry, treating as absent");
                None
            }
        }
    }

    /// Non-finite coordinates can't be written as JSON numbers.
    fn save_fix(&self, key: &str, coordinate: Coordinate, ts: i64) -> Result<(), StoreError> {
        if !coordinate.is_finite() {
            return Err(StoreError::InvalidCoordinate(coordinate.to_string()));
        }
        self.save(key, &StoredFix::new(coordinate, ts))
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let contents = serde_json::to_string(value)?;
        self.store.set(key, &contents)
    }

    // ===== Device fix =====

    pub fn read_cached(&self) -> Option<CachedLocation> {
        self.load::<StoredFix>(CACHED_FIX_KEY).map(CachedLocation::from)
    }

    pub fn write_cached(&self, coordinate: Coordinate) -> Result<CachedLocation, StoreError> {
        let captured_at_ms = self.now_ms();
        self.save_fix(CACHED_FIX_KEY, coordinate, captured_at_ms)?;
        debug!(%coordinate, captured_at_ms, "Cached device fix");
        Ok(CachedLocation {
            coordinate,
            captured_at_ms,
        })
    }

    pub fn is_fresh(&self, cached: &CachedLocation) -> bool {
        cached.age_ms(self.now_ms()) < CACHE_TTL_MS
    }

    /// The cached fix, only if it is still within the TTL.
    pub fn read_fresh(&self) -> Option<CachedLocation> {
        self.read_cached().filter(|cached| self.is_fresh(cached))
    }

    pub fn clear_cached(&self) -> Result<(), StoreError> {
        self.store.remove(CACHED_FIX_KEY)
    }

    // ===== Manual fix =====

    pub fn read_manual(&self) -> Option<ManualLocation> {
        self.load::<StoredFix>(MANUAL_FIX_KEY).map(ManualLocation::from)
    }

    pub fn write_manual(&self, coordinate: Coordinate) -> Result<ManualLocation, StoreError> {
        let set_at_ms = self.now_ms();
        self.save_fix(MANUAL_FIX_KEY, coordinate, set_at_ms)?;
        Ok(ManualLocation {
            coordinate,
            set_at_ms,
        })
    }

    // ===== Fail counters =====

    /// Missing or unparsable counters read as zero.
    pub fn fail_count(&self, target_id: &str) -> u32 {
        self.store
            .get(&Self::fail_count_key(target_id))
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn increment_fail_count(&self, target_id: &str) -> Result<u32, StoreError> {
        let count = self.fail_count(target_id).saturating_add(1);
        self.store
            .set(&Self::fail_count_key(target_id), &count.to_string())?;
        debug!(target_id, count, "Incremented location fail count");
        Ok(count)
    }

    pub fn clear_fail_count(&self, target_id: &str) -> Result<(), StoreError> {
        self.store.remove(&Self::fail_count_key(target_id))
    }

    // ===== Summary =====

    pub fn summary(&self) -> CacheSummary {
        let now = self.now_ms();
        let cached = self.read_cached();
        let manual = self.read_manual();
        CacheSummary {
            cached_fresh: cached.as_ref().map(|c| self.is_fresh(c)).unwrap_or(false),
            cached_age: cached.as_ref().map(|c| c.age_display(now)),
            cached,
            manual_age: manual.as_ref().map(|m| m.age_display(now)),
            manual,
        }
    }
}

/// What the store currently holds, for status displays.
#[derive(Debug, Default)]
pub struct CacheSummary {
    pub cached: Option<CachedLocation>,
    pub cached_fresh: bool,
    pub cached_age: Option<String>,
    pub manual: Option<ManualLocation>,
    pub manual_age: Option<String>,
}

impl CacheSummary {
    pub fn cached_age_or_never(&self) -> String {
        self.cached_age.clone().unwrap_or_else(|| "never".to_string())
    }

    pub fn manual_age_or_never(&self) -> String {
        self.manual_age.clone().unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
