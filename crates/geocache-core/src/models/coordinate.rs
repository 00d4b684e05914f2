use serde::{Deserialize, Serialize};

/// Milliseconds per minute, for age display.
const MS_PER_MINUTE: i64 = 60_000;

/// A latitude/longitude pair in degrees (WGS84 assumed, not range-checked).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = String;

    /// Parse `"LAT,LNG"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LNG but got '{}'", s))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid latitude '{}': {}", lat.trim(), e))?;
        let longitude = lng
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid longitude '{}': {}", lng.trim(), e))?;
        Ok(Self::new(latitude, longitude))
    }
}

/// Last device-derived fix, as held by the cache store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedLocation {
    pub coordinate: Coordinate,
    pub captured_at_ms: i64,
}

impl CachedLocation {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.captured_at_ms
    }

    pub fn age_display(&self, now_ms: i64) -> String {
        age_display(self.age_ms(now_ms))
    }
}

/// A coordinate the user entered by hand. Never expires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualLocation {
    pub coordinate: Coordinate,
    pub set_at_ms: i64,
}

impl ManualLocation {
    pub fn age_display(&self, now_ms: i64) -> String {
        age_display(now_ms - self.set_at_ms)
    }
}

/// On-disk shape shared by the cached and manual records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct StoredFix {
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
}

impl StoredFix {
    pub fn new(coordinate: Coordinate, ts: i64) -> Self {
        Self {
            lat: coordinate.latitude,
            lng: coordinate.longitude,
            ts,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

impl From<StoredFix> for CachedLocation {
    fn from(fix: StoredFix) -> Self {
        Self {
            coordinate: fix.coordinate(),
            captured_at_ms: fix.ts,
        }
    }
}

impl From<StoredFix> for ManualLocation {
    fn from(fix: StoredFix) -> Self {
        Self {
            coordinate: fix.coordinate(),
            set_at_ms: fix.ts,
        }
    }
}

/// Render an age in milliseconds as "just now", "5m ago", "2h ago", "3d ago".
pub fn age_display(age_ms: i64) -> String {
    let minutes = age_ms / MS_PER_MINUTE;
    if minutes < 1 {
        // Covers clock skew too
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        let c: Coordinate = "-23.5505, -46.6333".parse().unwrap();
        assert_eq!(c, Coordinate::new(-23.5505, -46.6333));
    }

    #[test]
    fn test_parse_coordinate_rejects_garbage() {
        assert!("12.5".parse::<Coordinate>().is_err());
        assert!("north,south".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_stored_fix_uses_short_keys() {
        let json = serde_json::to_string(&StoredFix::new(Coordinate::new(1.5, 2.5), 42)).unwrap();
        assert_eq!(json, r#"{"lat":1.5,"lng":2.5,"ts":42}"#);
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-5_000), "just now");
        assert_eq!(age_display(30_000), "just now");
        assert_eq!(age_display(5 * MS_PER_MINUTE), "5m ago");
        assert_eq!(age_display(90 * MS_PER_MINUTE), "2h ago");
        assert_eq!(age_display(70 * MS_PER_MINUTE), "1h ago");
        assert_eq!(age_display(3 * 1440 * MS_PER_MINUTE), "3d ago");
    }

    #[test]
    fn test_cached_location_age() {
        let cached = CachedLocation {
            coordinate: Coordinate::new(0.0, 0.0),
            captured_at_ms: 1_000,
        };
        assert_eq!(cached.age_ms(61_000), 60_000);
        assert_eq!(cached.age_display(61_000), "1m ago");
    }
}
