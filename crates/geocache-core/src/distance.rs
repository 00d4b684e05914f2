//! Great-circle distances between coordinates.

use std::cmp::Ordering;

use crate::models::{Coordinate, Place, RankedPlace};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Sort key for places whose distance can't be determined.
pub const UNKNOWN_DISTANCE_KM: f64 = 999.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Haversine distance between two coordinates, in kilometres.
///
/// ```
/// use geocache_core::distance::haversine_km;
/// use geocache_core::models::Coordinate;
///
/// let d = haversine_km(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 1.0));
/// assert!((d - 111.19).abs() < 0.01);
/// ```
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1_rad = a.latitude * DEG_TO_RAD;
    let lat2_rad = b.latitude * DEG_TO_RAD;
    let delta_lat = (b.latitude - a.latitude) * DEG_TO_RAD;
    let delta_lon = (b.longitude - a.longitude) * DEG_TO_RAD;

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two possibly-missing coordinates.
///
/// `None` when either side is missing or not a finite number. Zero degrees
/// is an ordinary coordinate (equator, prime meridian).
pub fn distance_km(a: Option<&Coordinate>, b: Option<&Coordinate>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some(haversine_km(a, b)),
        _ => None,
    }
}

/// Order places nearest first from `origin`.
///
/// Measured distances win over the catalog's listed distance; places with
/// neither sort as [`UNKNOWN_DISTANCE_KM`]. Ties keep input order.
pub fn rank_nearest<'a>(origin: Option<&Coordinate>, places: &'a [Place]) -> Vec<RankedPlace<'a>> {
    let mut ranked: Vec<RankedPlace<'a>> = places
        .iter()
        .map(|place| match distance_km(origin, place.coordinate.as_ref()) {
            Some(km) => RankedPlace {
                place,
                distance_km: Some(km),
                measured: true,
            },
            None => RankedPlace {
                place,
                distance_km: place.listed_distance_km,
                measured: false,
            },
        })
        .collect();

    ranked.sort_by(|a, b| {
        let da = a.distance_km.unwrap_or(UNKNOWN_DISTANCE_KM);
        let db = b.distance_km.unwrap_or(UNKNOWN_DISTANCE_KM);
        da.partial_cmp(&db).unwrap_or(Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAO_PAULO: Coordinate = Coordinate {
        latitude: -23.5505,
        longitude: -46.6333,
    };
    const RIO: Coordinate = Coordinate {
        latitude: -22.9068,
        longitude: -43.1729,
    };

    #[test]
    fn test_same_point_is_zero() {
        for c in [SAO_PAULO, RIO, Coordinate::new(0.0, 0.0), Coordinate::new(89.9, -179.9)] {
            assert_eq!(haversine_km(&c, &c), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (SAO_PAULO, RIO),
            (Coordinate::new(0.0, 0.0), Coordinate::new(45.0, 90.0)),
            (Coordinate::new(-33.9, 18.4), Coordinate::new(51.5, -0.1)),
        ];
        for (a, b) in pairs {
            assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = haversine_km(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_sao_paulo_to_rio() {
        let d = haversine_km(&SAO_PAULO, &RIO);
        assert!((d - 361.0).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn test_missing_inputs() {
        assert_eq!(distance_km(None, Some(&RIO)), None);
        assert_eq!(distance_km(Some(&RIO), None), None);
        assert_eq!(distance_km(Some(&Coordinate::new(f64::NAN, 0.0)), Some(&RIO)), None);
    }

    #[test]
    fn test_zero_coordinates_are_valid() {
        let origin = Coordinate::new(0.0, 0.0);
        let d = distance_km(Some(&origin), Some(&Coordinate::new(0.0, 1.0)));
        assert!(d.is_some());
    }

    #[test]
    fn test_rank_nearest() {
        let places = vec![
            Place::new("far", "Far").at(RIO),
            Place::new("unknown", "Unknown"),
            Place::new("listed", "Listed").with_listed_distance(2.1),
            Place::new("near", "Near").at(Coordinate::new(-23.56, -46.64)),
        ];

        let ranked = rank_nearest(Some(&SAO_PAULO), &places);
        let order: Vec<&str> = ranked.iter().map(|r| r.place.id.as_str()).collect();
        assert_eq!(order, vec!["near", "listed", "far", "unknown"]);
        assert!(ranked[0].measured);
        assert!(!ranked[1].measured);
        assert_eq!(ranked[3].distance_km, None);
    }

    #[test]
    fn test_rank_without_origin_uses_listed() {
        let places = vec![
            Place::new("b", "B").with_listed_distance(1.2).at(RIO),
            Place::new("a", "A").with_listed_distance(0.8),
        ];
        let ranked = rank_nearest(None, &places);
        assert_eq!(ranked[0].place.id, "a");
        assert!(ranked.iter().all(|r| !r.measured));
    }
}
