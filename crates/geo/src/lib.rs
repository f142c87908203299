// Rust guideline compliant 2026-08-21

//! GeoMath: great-circle distance between WGS84 coordinate pairs.
//!
//! Entry points: [`distance_meters`], [`offset_by_meters`]. Pure functions,
//! no side effects; every other workspace crate treats this as the single
//! source of truth for proximity math.

/// Mean Earth radius in meters (IUGG value, spherical model).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle (haversine) distance in meters between two coordinate pairs.
///
/// Symmetric in its arguments and zero for identical points. The spherical
/// model is accurate to ~0.5% against the WGS84 ellipsoid, far below any
/// useful geofence radius.
#[must_use]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // asin form is numerically stable for the small angles geofencing uses.
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Displace a coordinate by metric offsets: `north_m` along the meridian,
/// `east_m` along the local parallel.
///
/// Equirectangular approximation -- intended for small offsets (test
/// fixtures, simulated jitter), not for navigation-grade math. Longitude
/// displacement degenerates near the poles where `cos(lat)` vanishes.
#[must_use]
pub fn offset_by_meters(lat: f64, lon: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let meters_per_deg_lat = EARTH_RADIUS_M.to_radians();
    let meters_per_deg_lon = meters_per_deg_lat * lat.to_radians().cos();
    (lat + north_m / meters_per_deg_lat, lon + east_m / meters_per_deg_lon)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
