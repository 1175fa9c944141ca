//! Spherical-earth geometry: dead-reckoning vectors and range.

use crate::tracker::Track;
use crate::types::LatLon;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METERS_PER_NM: f64 = 1852.0;
const EARTH_RADIUS_NM: f64 = EARTH_RADIUS_M / METERS_PER_NM;

/// Default look-ahead for velocity vectors.
pub const VECTOR_MINUTES: f64 = 1.0;

/// Great-circle destination from `origin` along `bearing_deg` (true) for
/// `distance_m` meters. Longitude is normalised to [-180, 180).
pub fn destination(origin: LatLon, bearing_deg: f64, distance_m: f64) -> LatLon {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon = (lambda2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    LatLon::new(phi2.to_degrees(), lon)
}

/// Distance covered at `gs_kts` over `minutes`, in meters.
pub fn distance_m(gs_kts: f64, minutes: f64) -> f64 {
    gs_kts * (minutes / 60.0) * METERS_PER_NM
}

/// Projected position after `minutes` at constant track and ground speed.
///
/// `None` unless ground speed is finite and positive and track is finite.
pub fn dead_reckon(
    origin: LatLon,
    track_deg: Option<f64>,
    gs_kts: Option<f64>,
    minutes: f64,
) -> Option<LatLon> {
    let gs = gs_kts.filter(|g| g.is_finite() && *g > 0.0)?;
    let trk = track_deg.filter(|t| t.is_finite())?;
    Some(destination(origin, trk, distance_m(gs, minutes)))
}

/// Velocity vector endpoint for a track.
pub fn project(track: &Track, minutes: f64) -> Option<LatLon> {
    dead_reckon(track.position(), track.track_deg, track.gs_kts, minutes)
}

/// Great-circle distance in nautical miles.
pub fn haversine_nm(a: LatLon, b: LatLon) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_NM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}
