//! Common types for geodedup.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in degrees.
///
/// Coordinates are compared only through distance functions, so there is no
/// `PartialEq` impl.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, -90 to 90.
    pub lat: f64,
    /// Longitude in degrees, -180 to 180.
    pub lon: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    ///
    /// # Errors
    /// Returns [`GeoError::InvalidCoordinate`] if either component is not
    /// finite or lies outside its range.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let coord = Self { lat, lon };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate { lat, lon })
        }
    }

    /// Create a coordinate without range checks.
    ///
    /// Loaders use this and validate the whole batch later.
    #[must_use]
    pub const fn new_unchecked(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both components are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5},{:.5})", self.lat, self.lon)
    }
}

/// A city entry as found in the OpenWeatherMap city list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityRecord {
    /// Stable, externally assigned identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: u64,
    /// City name.
    pub name: String,
    /// ISO country code (may be empty).
    #[serde(default)]
    pub country: String,
    /// Location.
    pub coord: Coordinate,
}

impl CityRecord {
    /// Create a new city record.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, country: impl Into<String>, coord: Coordinate) -> Self {
        Self {
            id,
            name: name.into(),
            country: country.into(),
            coord,
        }
    }

    /// Latitude of the record in degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.coord.lat
    }

    /// Longitude of the record in degrees.
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.coord.lon
    }
}

impl fmt::Display for CityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.name, self.coord, self.country, self.id)
    }
}
