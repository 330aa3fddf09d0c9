//! Geodesy helpers: great-circle distance and local-frame conversions.

use crate::types::{FusedPosition, GpsFix};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude in the flat local frame
pub const METERS_PER_DEGREE: f64 = 111_000.0;

// Keeps the longitude scale finite at the poles
const MIN_COS_LAT: f64 = 1e-9;

/// Haversine great-circle distance in meters
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Convert a planar offset (dx east, dy north, meters) into a lat/lon delta.
///
/// Near the poles `cos(lat)` approaches zero; it is clamped so the longitude
/// delta stays finite, but the result is not meaningful there.
pub fn local_offset_to_degrees(dx: f64, dy: f64, at_latitude: f64) -> (f64, f64) {
    let cos_lat = at_latitude.to_radians().cos();
    let cos_lat = if cos_lat.abs() < MIN_COS_LAT {
        MIN_COS_LAT.copysign(cos_lat)
    } else {
        cos_lat
    };
    let d_lat = dy / METERS_PER_DEGREE;
    let d_lon = dx / (METERS_PER_DEGREE * cos_lat);
    (d_lat, d_lon)
}

/// Horizontal position error between a raw fix and the fused estimate.
///
/// Equirectangular approximation scaled at the fix latitude.
pub fn horizontal_error_meters(fix: &GpsFix, fused: &FusedPosition) -> f64 {
    let lat_diff = fix.latitude - fused.latitude;
    let lon_diff = fix.longitude - fused.longitude;
    let cos_lat = fix.latitude.to_radians().cos();
    METERS_PER_DEGREE * (lat_diff * lat_diff + lon_diff * lon_diff * cos_lat * cos_lat).sqrt()
}
