//! Geodesic distance between coordinates.
//!
//! Two models are provided:
//! - [`haversine_distance`]: spherical Earth, fast, off by up to ~0.5% because
//!   it ignores flattening.
//! - [`ellipsoidal_distance`]: first-order flattening correction on the WGS-84
//!   ellipsoid (Andoyer-Lambert form). This is the authoritative distance for
//!   deduplication decisions.
//!
//! ```
//! use geodedup_core::{ellipsoidal_distance, haversine_distance, Coordinate};
//!
//! let london = Coordinate::new(51.5074, -0.1278).unwrap();
//! let paris = Coordinate::new(48.8566, 2.3522).unwrap();
//!
//! let fast = haversine_distance(&london, &paris);
//! let accurate = ellipsoidal_distance(&london, &paris).unwrap();
//! assert!((fast - accurate).abs() / accurate < 0.01);
//! ```

use crate::types::Coordinate;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used by the spherical model.
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_007.2;

/// WGS-84 equatorial radius in meters.
pub const EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// WGS-84 polar radius in meters.
pub const POLAR_RADIUS_M: f64 = 6_356_752.315;

/// Flattening of the ellipsoid, `(a - b) / a`.
pub const FLATTENING: f64 = (EQUATORIAL_RADIUS_M - POLAR_RADIUS_M) / EQUATORIAL_RADIUS_M;

/// Great-circle distance in meters on a sphere of radius [`MEAN_EARTH_RADIUS_M`].
///
/// Always defined; identical points yield `0.0`.
#[must_use]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let half_dphi = (b.lat - a.lat).to_radians() / 2.0;
    let half_dlambda = (b.lon - a.lon).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    // Rounding can push h a hair past 1 for near-antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance in meters on the WGS-84 ellipsoid.
///
/// Returns `None` when the formula is not computable: coincident points
/// (`s == 0`) or the antipodal degenerate case (`c == 0`). `None` is not a
/// distance; callers that gate on a threshold should treat it as zero, see
/// [`DistanceMetric::gate_distance`].
#[must_use]
pub fn ellipsoidal_distance(a: &Coordinate, b: &Coordinate) -> Option<f64> {
    let f = (a.lat + b.lat).to_radians() / 2.0;
    let g = (a.lat - b.lat).to_radians() / 2.0;
    let l = (a.lon - b.lon).to_radians() / 2.0;

    let (sin_f2, cos_f2) = (f.sin().powi(2), f.cos().powi(2));
    let (sin_g2, cos_g2) = (g.sin().powi(2), g.cos().powi(2));
    let (sin_l2, cos_l2) = (l.sin().powi(2), l.cos().powi(2));

    let s = sin_g2 * cos_l2 + cos_f2 * sin_l2;
    let c = cos_g2 * cos_l2 + sin_f2 * sin_l2;
    if s == 0.0 || c == 0.0 {
        return None;
    }

    let ratio = (s / c).sqrt();
    let omega = ratio.atan();
    let r = ratio / omega;
    let d = 2.0 * omega * EQUATORIAL_RADIUS_M;
    let h1 = (3.0 * r - 1.0) / (2.0 * c);
    let h2 = (3.0 * r + 1.0) / (2.0 * s);

    Some(d * (1.0 + FLATTENING * h1 * sin_f2 * cos_g2 - FLATTENING * h2 * cos_f2 * sin_g2))
}

impl Coordinate {
    /// Spherical distance to `other` in meters.
    #[must_use]
    pub fn haversine_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }

    /// Ellipsoidal distance to `other` in meters, `None` if degenerate.
    #[must_use]
    pub fn ellipsoidal_to(&self, other: &Coordinate) -> Option<f64> {
        ellipsoidal_distance(self, other)
    }
}

/// Distance function used for the final accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// WGS-84 ellipsoidal distance.
    #[default]
    Ellipsoidal,
    /// Spherical haversine distance.
    Haversine,
}

impl DistanceMetric {
    /// Distance in meters, or `None` if this metric cannot compute it.
    #[must_use]
    pub fn distance(&self, a: &Coordinate, b: &Coordinate) -> Option<f64> {
        match self {
            Self::Ellipsoidal => ellipsoidal_distance(a, b),
            Self::Haversine => Some(haversine_distance(a, b)),
        }
    }

    /// Distance for threshold decisions: an undefined result counts as `0.0`.
    #[must_use]
    pub fn gate_distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        self.distance(a, b).unwrap_or(0.0)
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ellipsoidal => "ellipsoidal",
            Self::Haversine => "haversine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    const LONDON: (f64, f64) = (51.5074, -0.1278);
    const PARIS: (f64, f64) = (48.8566, 2.3522);

    #[test]
    fn test_london_paris_reference() {
        let london = c(LONDON.0, LONDON.1);
        let paris = c(PARIS.0, PARIS.1);
        let reference = 343_500.0;

        let hav = haversine_distance(&london, &paris);
        let ell = ellipsoidal_distance(&london, &paris).unwrap();

        assert!((hav - reference).abs() / reference < 0.01, "haversine {hav}");
        assert!((ell - reference).abs() / reference < 0.01, "ellipsoidal {ell}");
    }

    #[test]
    fn test_ellipsoidal_symmetry() {
        let pairs = [
            (c(52.0, 9.0), c(50.0, 9.0)),
            (c(-33.86, 151.2), c(-37.81, 144.96)),
            (c(0.0, 179.9), c(0.5, -179.8)),
            (c(64.1, -21.9), c(64.2, -21.5)),
        ];
        for (a, b) in pairs {
            let ab = ellipsoidal_distance(&a, &b).unwrap();
            let ba = ellipsoidal_distance(&b, &a).unwrap();
            assert!((ab - ba).abs() < 1e-6, "{a} {b}: {ab} vs {ba}");
        }
    }

    #[test]
    fn test_ellipsoidal_identical_is_undefined() {
        let a = c(52.0, 9.0);
        assert!(ellipsoidal_distance(&a, &a).is_none());
        assert_eq!(DistanceMetric::Ellipsoidal.gate_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_haversine_identical_is_zero() {
        let a = c(-12.5, 130.8);
        assert_eq!(haversine_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_models_agree_at_regional_range() {
        let origin = c(47.0, 8.0);
        for (dlat, dlon) in [(0.01, 0.0), (0.0, 0.01), (0.5, 0.5), (-1.5, 2.0), (2.5, -2.5)] {
            let other = c(origin.lat + dlat, origin.lon + dlon);
            let hav = haversine_distance(&origin, &other);
            let ell = ellipsoidal_distance(&origin, &other).unwrap();
            assert!((hav - ell).abs() / ell < 0.01, "{other}: {hav} vs {ell}");
        }
    }

    #[test]
    fn test_short_range_scale() {
        // 0.0009 degrees of latitude is roughly 100 m.
        let a = c(52.0, 9.0);
        let b = c(52.0009, 9.0);
        let d = ellipsoidal_distance(&a, &b).unwrap();
        assert!((99.0..102.0).contains(&d), "{d}");
    }

    #[test]
    fn test_crosses_antimeridian() {
        let a = c(0.0, 179.999);
        let b = c(0.0, -179.999);
        let d = ellipsoidal_distance(&a, &b).unwrap();
        assert!((200.0..250.0).contains(&d), "{d}");
    }

    #[test]
    fn test_metric_selection() {
        let a = c(52.0, 9.0);
        let b = c(50.0, 9.0);
        assert_eq!(
            DistanceMetric::Haversine.gate_distance(&a, &b),
            haversine_distance(&a, &b)
        );
        assert_eq!(
            DistanceMetric::Ellipsoidal.distance(&a, &b),
            ellipsoidal_distance(&a, &b)
        );
        assert_eq!(DistanceMetric::default(), DistanceMetric::Ellipsoidal);
        assert_eq!(DistanceMetric::Haversine.name(), "haversine");
    }
}
