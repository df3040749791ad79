//! Great-circle distance helpers.
//!
//! Everything here measures straight-line distance over a spherical Earth.
//! Roads, one-way streets and traffic are ignored, so the figures rank
//! candidate orderings well but are not navigation-grade travel times.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3959.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Minutes needed to cover `miles` at a constant average speed.
pub fn travel_minutes(miles: f64, average_speed_mph: f64) -> f64 {
    if average_speed_mph <= 0.0 {
        return 0.0;
    }
    miles / average_speed_mph * 60.0
}

/// Length of an open path visiting `points` in order, optionally starting at `start`.
pub fn path_length(start: Option<GeoPoint>, points: &[GeoPoint]) -> f64 {
    let mut total = 0.0;
    let mut previous = start;
    for point in points {
        if let Some(prev) = previous {
            total += haversine_miles(prev, *point);
        }
        previous = Some(*point);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = GeoPoint::new(34.73, -86.58);
        assert_eq!(haversine_miles(p, p), 0.0);
    }

    #[test]
    fn test_known_distance() {
        // Huntsville, AL to Birmingham, AL is roughly 83 miles as the crow flies.
        let huntsville = GeoPoint::new(34.7304, -86.5861);
        let birmingham = GeoPoint::new(33.5186, -86.8104);

        let miles = haversine_miles(huntsville, birmingham);
        assert!((miles - 84.5).abs() < 2.0, "got {miles}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(34.70, -86.60);
        let b = GeoPoint::new(34.80, -86.50);
        assert!((haversine_miles(a, b) - haversine_miles(b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_travel_minutes_at_thirty_mph() {
        assert!((travel_minutes(15.0, 30.0) - 30.0).abs() < 1e-9);
        assert_eq!(travel_minutes(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_path_length_without_start() {
        let a = GeoPoint::new(34.70, -86.60);
        let b = GeoPoint::new(34.80, -86.50);
        assert_eq!(path_length(None, &[a]), 0.0);
        assert!((path_length(None, &[a, b]) - haversine_miles(a, b)).abs() < 1e-12);
        assert!((path_length(Some(b), &[a]) - haversine_miles(b, a)).abs() < 1e-12);
    }
}
