//! Scope session: the owned state behind one display.
//!
//! Holds the selected facility, its track store, the latest weather line and
//! the data-block toggle. Every poll result is tagged with the generation it
//! was issued under; switching facility bumps the generation so responses
//! still in flight for the old facility are discarded instead of landing in
//! the new store.

use serde::Serialize;

use crate::facility::Facility;
use crate::geo::{self, haversine_nm};
use crate::label::DataBlock;
use crate::observation::Observation;
use crate::tracker::{MergeReport, Track, TrackStore};
use crate::types::{LatLon, Millis};

/// Latest weather report for the facility station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metar {
    pub station: String,
    pub text: String,
    pub fetched_at: Millis,
}

/// One rendered scope target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub id: String,
    pub position: LatLon,
    /// Dead-reckoned endpoint of the velocity leader line.
    pub vector: Option<LatLon>,
    pub history: Vec<LatLon>,
    pub track_deg: Option<f64>,
    pub squawk: Option<String>,
    pub range_nm: f64,
    pub age_ms: Millis,
    /// Present only while data blocks are toggled on.
    pub block: Option<DataBlock>,
}

/// Everything a client needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeView {
    pub facility: Facility,
    pub liveatc_url: String,
    pub metar: Option<Metar>,
    pub show_tags: bool,
    pub generation: u64,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone)]
pub struct Session {
    facility: &'static Facility,
    store: TrackStore,
    metar: Option<Metar>,
    show_tags: bool,
    generation: u64,
}

impl Session {
    /// `store` fixes the TTL and altitude floor; its contents are discarded.
    pub fn new(facility: &'static Facility, mut store: TrackStore) -> Self {
        store.clear();
        Session {
            facility,
            store,
            metar: None,
            show_tags: true,
            generation: 0,
        }
    }

    pub fn facility(&self) -> &'static Facility {
        self.facility
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn metar(&self) -> Option<&Metar> {
        self.metar.as_ref()
    }

    pub fn show_tags(&self) -> bool {
        self.show_tags
    }

    /// Flip data-block display. Returns the new state.
    pub fn toggle_tags(&mut self) -> bool {
        self.show_tags = !self.show_tags;
        self.show_tags
    }

    /// Tear down state for the old facility. Returns the new generation.
    pub fn switch_facility(&mut self, facility: &'static Facility) -> u64 {
        self.facility = facility;
        self.store.clear();
        self.metar = None;
        self.generation += 1;
        self.generation
    }

    /// Merge a traffic batch polled under `generation`.
    ///
    /// Returns `None` (store untouched) when the batch belongs to a
    /// session that has since been switched away.
    pub fn apply_traffic(
        &mut self,
        generation: u64,
        batch: Vec<Observation>,
        now: Millis,
    ) -> Option<MergeReport> {
        if generation != self.generation {
            return None;
        }
        Some(self.store.apply(batch, now))
    }

    /// Eviction pass without a merge, for a traffic poll that failed.
    ///
    /// Returns the number of tracks removed, or `None` for a stale
    /// generation.
    pub fn expire(&mut self, generation: u64, now: Millis) -> Option<usize> {
        if generation != self.generation {
            return None;
        }
        Some(self.store.evict_stale(now))
    }

    /// Record a weather report polled under `generation`.
    pub fn apply_metar(&mut self, generation: u64, text: &str, now: Millis) -> bool {
        if generation != self.generation {
            return false;
        }
        self.metar = Some(Metar {
            station: self.facility.station.to_string(),
            text: text.trim().to_string(),
            fetched_at: now,
        });
        true
    }

    fn target(&self, track: &Track, now: Millis) -> Target {
        Target {
            id: track.id.clone(),
            position: track.position(),
            vector: geo::project(track, geo::VECTOR_MINUTES),
            history: track.history.iter().copied().collect(),
            track_deg: track.track_deg,
            squawk: track.squawk.clone(),
            range_nm: haversine_nm(self.facility.center, track.position()),
            age_ms: track.age(now),
            block: self.show_tags.then(|| DataBlock::from_track(track)),
        }
    }

    /// Tracks past the TTL are left out even before the store evicts them.
    pub fn targets(&self, now: Millis) -> Vec<Target> {
        let ttl = self.store.ttl_ms;
        self.store
            .snapshot()
            .into_iter()
            .filter(|t| !t.is_stale(now, ttl))
            .map(|t| self.target(t, now))
            .collect()
    }

    pub fn view(&self, now: Millis) -> ScopeView {
        ScopeView {
            facility: *self.facility,
            liveatc_url: self.facility.liveatc_url(),
            metar: self.metar.clone(),
            show_tags: self.show_tags,
            generation: self.generation,
            targets: self.targets(now),
        }
    }
}
