use crate::models::Coordinate;

/// Format a distance for display, e.g. "1.2 km"
pub fn format_distance_km(km: f64) -> String {
    format!("{:.1} km", km)
}

/// Format an optional distance, returning a default if None
pub fn format_optional_distance(km: Option<f64>, default: &str) -> String {
    km.map(format_distance_km)
        .unwrap_or_else(|| default.to_string())
}

/// Format an optional coordinate as "lat, lng"
pub fn format_coordinate(coordinate: Option<&Coordinate>) -> String {
    match coordinate {
        Some(c) => c.to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance_km() {
        assert_eq!(format_distance_km(0.8), "0.8 km");
        assert_eq!(format_distance_km(111.19492), "111.2 km");
        assert_eq!(format_distance_km(0.0), "0.0 km");
    }

    #[test]
    fn test_format_optional_distance() {
        assert_eq!(format_optional_distance(None, "-"), "-");
        assert_eq!(format_optional_distance(Some(2.14), "-"), "2.1 km");
    }

    #[test]
    fn test_format_coordinate() {
        assert_eq!(format_coordinate(None), "unknown");
        assert_eq!(
            format_coordinate(Some(&Coordinate::new(10.0, -20.5))),
            "10.000000, -20.500000"
        );
    }
}
