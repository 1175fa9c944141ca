//! Track store: poll, merge, evict.
//!
//! Pure logic, no I/O. The caller polls an aircraft list, hands the parsed
//! batch to [`TrackStore::apply`] with the current time, and renders whatever
//! the store holds afterwards. A failed poll never calls `apply`; the caller
//! runs [`TrackStore::evict_stale`] instead, so the previous picture stays up
//! until the next good batch or until its tracks age out.
//!
//! Per track: latest position, ground vector, altitude fields, identity
//! strings, and a short position history for the trail.

use std::collections::{HashMap, VecDeque};

use crate::observation::{first_altitude, Altitude, Observation};
use crate::types::{LatLon, Millis};

/// Tracks older than this are dropped on the next eviction pass.
pub const TRACK_TTL_MS: Millis = 10_000;

/// Observations below this altitude (or without one) never enter the store.
pub const MIN_ALTITUDE_FT: f64 = 100.0;

/// Prior positions kept per track, newest first.
pub const HISTORY_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// Merged state for a single aircraft.
///
/// Optional fields follow shallow-merge rules: a later observation only
/// overwrites the fields it actually carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub hex: Option<String>,
    pub icao: Option<String>,
    pub flight: Option<String>,
    pub callsign: Option<String>,
    pub aircraft_type: Option<String>,
    pub squawk: Option<String>,

    pub lat: f64,
    pub lon: f64,
    pub track_deg: Option<f64>,
    pub gs_kts: Option<f64>,

    pub alt_baro: Option<Altitude>,
    pub alt_geom: Option<Altitude>,
    pub altitude: Option<Altitude>,

    pub last_seen: Millis,
    pub history: VecDeque<LatLon>,
}

fn non_blank(val: &Option<String>) -> Option<&str> {
    val.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn overlay<T>(slot: &mut Option<T>, val: Option<T>) {
    if val.is_some() {
        *slot = val;
    }
}

impl Track {
    fn new(id: String, obs: Observation, pos: LatLon, now: Millis) -> Self {
        Track {
            id,
            hex: obs.hex,
            icao: obs.icao,
            flight: obs.flight,
            callsign: obs.callsign,
            aircraft_type: obs.aircraft_type,
            squawk: obs.squawk,
            lat: pos.lat,
            lon: pos.lon,
            track_deg: obs.track,
            gs_kts: obs.gs,
            alt_baro: obs.alt_baro,
            alt_geom: obs.alt_geom,
            altitude: obs.altitude,
            last_seen: now,
            history: VecDeque::with_capacity(HISTORY_LEN + 1),
        }
    }

    fn merge(&mut self, obs: Observation, pos: LatLon, now: Millis) {
        self.history.push_front(self.position());
        self.history.truncate(HISTORY_LEN);

        overlay(&mut self.hex, obs.hex);
        overlay(&mut self.icao, obs.icao);
        overlay(&mut self.flight, obs.flight);
        overlay(&mut self.callsign, obs.callsign);
        overlay(&mut self.aircraft_type, obs.aircraft_type);
        overlay(&mut self.squawk, obs.squawk);
        overlay(&mut self.track_deg, obs.track);
        overlay(&mut self.gs_kts, obs.gs);
        overlay(&mut self.alt_baro, obs.alt_baro);
        overlay(&mut self.alt_geom, obs.alt_geom);
        overlay(&mut self.altitude, obs.altitude);

        self.lat = pos.lat;
        self.lon = pos.lon;
        self.last_seen = now;
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Same precedence as [`Observation::resolved_altitude`].
    pub fn altitude_ft(&self) -> Option<f64> {
        first_altitude([self.alt_baro, self.alt_geom, self.altitude])
    }

    pub fn callsign_text(&self) -> Option<&str> {
        non_blank(&self.flight).or_else(|| non_blank(&self.callsign))
    }

    pub fn age(&self, now: Millis) -> Millis {
        now - self.last_seen
    }

    pub fn is_stale(&self, now: Millis, ttl: Millis) -> bool {
        self.age(now) > ttl
    }
}

// ---------------------------------------------------------------------------
// Merge report
// ---------------------------------------------------------------------------

/// What one `apply` call did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub received: usize,
    pub rejected_position: usize,
    pub rejected_altitude: usize,
    pub created: usize,
    pub updated: usize,
    pub evicted: usize,
}

impl MergeReport {
    pub fn accepted(&self) -> usize {
        self.created + self.updated
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Mapping from identity key to [`Track`], bounded by TTL eviction.
#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: HashMap<String, Track>,
    pub ttl_ms: Millis,
    pub min_altitude_ft: f64,
}

impl Default for TrackStore {
    fn default() -> Self {
        TrackStore::new(TRACK_TTL_MS, MIN_ALTITUDE_FT)
    }
}

impl TrackStore {
    pub fn new(ttl_ms: Millis, min_altitude_ft: f64) -> Self {
        TrackStore {
            tracks: HashMap::new(),
            ttl_ms,
            min_altitude_ft,
        }
    }

    /// Filter a polled batch, merge survivors, then run an eviction pass.
    pub fn apply(&mut self, batch: Vec<Observation>, now: Millis) -> MergeReport {
        let mut report = MergeReport {
            received: batch.len(),
            ..MergeReport::default()
        };

        for obs in batch {
            let Some(pos) = obs.position() else {
                report.rejected_position += 1;
                continue;
            };
            match obs.resolved_altitude() {
                Some(alt) if alt >= self.min_altitude_ft => {}
                _ => {
                    report.rejected_altitude += 1;
                    continue;
                }
            }
            // A position guarantees the "lat,lon" fallback key.
            let Some(id) = obs.identity() else {
                report.rejected_position += 1;
                continue;
            };

            match self.tracks.get_mut(&id) {
                Some(track) => {
                    track.merge(obs, pos, now);
                    report.updated += 1;
                }
                None => {
                    let track = Track::new(id.clone(), obs, pos, now);
                    self.tracks.insert(id, track);
                    report.created += 1;
                }
            }
        }

        report.evicted = self.evict_stale(now);
        report
    }

    /// Remove tracks not refreshed within the TTL. Returns count removed.
    pub fn evict_stale(&mut self, now: Millis) -> usize {
        let before = self.tracks.len();
        let ttl = self.ttl_ms;
        self.tracks.retain(|_, t| !t.is_stale(now, ttl));
        before - self.tracks.len()
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// All tracks ordered by identity key, for stable output.
    pub fn snapshot(&self) -> Vec<&Track> {
        let mut all: Vec<_> = self.tracks.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
