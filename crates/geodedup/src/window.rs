//! Per-axis window half-widths for the rectangular pre-filter.
//!
//! The window must contain the whole threshold circle around a reference,
//! otherwise near duplicates slip past the pre-filter. [`WindowStrategy::Derived`]
//! sizes it from the minimum distance and the reference latitude;
//! [`WindowStrategy::Fixed`] uses constant half-widths.

use serde::{Deserialize, Serialize};

/// Smallest meridional radius of curvature on WGS-84 (at the equator),
/// `a (1 - e^2)`. Dividing by it over-estimates every angular extent.
pub const MIN_CURVATURE_RADIUS_M: f64 = 6_335_439.0;

/// Head-room applied to derived half-widths.
pub const WINDOW_MARGIN: f64 = 1.05;

/// Half-width in longitude that covers every meridian.
pub const FULL_LON_SPAN: f64 = 180.0;

/// How the window half-widths are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum WindowStrategy {
    /// Derived from the minimum distance and the reference latitude.
    #[default]
    Derived,
    /// Fixed half-widths in degrees, independent of latitude.
    ///
    /// Only correct when they over-estimate the threshold circle for every
    /// latitude in the data set.
    Fixed { dlat: f64, dlon: f64 },
}

/// Half-widths in degrees around one reference coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub dlat: f64,
    pub dlon: f64,
}

impl WindowStrategy {
    /// Half-widths for a reference at `lat` and threshold `min_distance_m`.
    #[must_use]
    pub fn window(&self, lat: f64, min_distance_m: f64) -> Window {
        match *self {
            Self::Fixed { dlat, dlon } => Window { dlat, dlon },
            Self::Derived => {
                let dlat = (min_distance_m / MIN_CURVATURE_RADIUS_M).to_degrees() * WINDOW_MARGIN;
                // The parallel circle is smallest at the window edge farthest from the equator.
                let far_lat = lat.abs() + dlat;
                let dlon = if far_lat >= 90.0 {
                    FULL_LON_SPAN
                } else {
                    (dlat / far_lat.to_radians().cos()).min(FULL_LON_SPAN)
                };
                Window { dlat, dlon }
            }
        }
    }
}

impl Window {
    /// Longitude intervals covered around `lon`, split at the antimeridian.
    ///
    /// Returns one interval, or two when the window wraps past ±180°.
    #[must_use]
    pub fn lon_ranges(&self, lon: f64) -> Vec<(f64, f64)> {
        if self.dlon >= FULL_LON_SPAN {
            return vec![(-180.0, 180.0)];
        }

        let low = lon - self.dlon;
        let high = lon + self.dlon;
        let mut ranges = vec![(low.max(-180.0), high.min(180.0))];
        if low < -180.0 {
            ranges.push((low + 360.0, 180.0));
        }
        if high > 180.0 {
            ranges.push((-180.0, high - 360.0));
        }
        ranges
    }

    /// Latitude interval around `lat`, clamped to the poles.
    #[must_use]
    pub fn lat_range(&self, lat: f64) -> (f64, f64) {
        ((lat - self.dlat).max(-90.0), (lat + self.dlat).min(90.0))
    }
}
