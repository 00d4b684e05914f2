use serde::{Deserialize, Serialize};

use super::Coordinate;

/// A distance-dependent target such as a market or hotel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    /// Distance published by the catalog, used when it can't be measured.
    #[serde(default, rename = "distance")]
    pub listed_distance_km: Option<f64>,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinate: None,
            listed_distance_km: None,
        }
    }

    pub fn at(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_listed_distance(mut self, km: f64) -> Self {
        self.listed_distance_km = Some(km);
        self
    }
}

/// A place together with the distance used to order it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlace<'a> {
    pub place: &'a Place,
    pub distance_km: Option<f64>,
    /// True when the distance was computed from coordinates rather than listed.
    pub measured: bool,
}
