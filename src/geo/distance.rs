use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Display, PartialEq)]
pub enum CoordinateError {
    #[display(fmt = "latitude and longitude must be finite numbers")]
    NotFinite,
    #[display(fmt = "latitude {} is outside -90..90", _0)]
    LatitudeOutOfRange(f64),
    #[display(fmt = "longitude {} is outside -180..180", _0)]
    LongitudeOutOfRange(f64),
}

impl std::error::Error for CoordinateError {}

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    #[schema(example = json!(-6.2))]
    pub latitude: f64,
    #[schema(example = 106.816)]
    pub longitude: f64,
}

impl Coordinate {
    /// Range-checked constructor. Use this for anything that came off the wire.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_meters(*self, *other)
    }
}

/// Great-circle distance in meters.
///
/// No validation happens here: NaN or out-of-range input yields a NaN or
/// meaningless distance. Callers validate with [`Coordinate::new`] first.
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn same_point_is_zero_meters() {
        let site = point(-6.2, 106.816);
        assert_eq!(haversine_meters(site, site), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (point(-6.2, 106.816), point(-6.205, 106.8161)),
            (point(51.5007, -0.1246), point(40.6892, -74.0445)),
            (point(0.0, 179.9), point(0.0, -179.9)),
        ];

        for (a, b) in pairs {
            assert!((haversine_meters(a, b) - haversine_meters(b, a)).abs() < 1e-6);
        }
    }

    #[test]
    fn small_offsets_match_expected_meters() {
        let site = point(-6.2, 106.816);

        let east = haversine_meters(site, point(-6.2, 106.8161));
        assert!((10.5..11.5).contains(&east), "got {east}");

        let south = haversine_meters(site, point(-6.205, 106.816));
        assert!((550.0..560.0).contains(&south), "got {south}");
    }

    #[test]
    fn antimeridian_is_short_way_round() {
        let d = haversine_meters(point(0.0, 179.9), point(0.0, -179.9));
        assert!(d < 25_000.0, "got {d}");
    }

    #[test]
    fn nan_propagates() {
        assert!(haversine_meters(point(f64::NAN, 0.0), point(0.0, 0.0)).is_nan());
    }

    #[test]
    fn coordinate_new_checks_ranges() {
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, 181.0),
            Err(CoordinateError::LongitudeOutOfRange(181.0))
        );
        assert_eq!(Coordinate::new(f64::NAN, 0.0), Err(CoordinateError::NotFinite));
        assert_eq!(
            Coordinate::new(0.0, f64::INFINITY),
            Err(CoordinateError::NotFinite)
        );
    }
}
