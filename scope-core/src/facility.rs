//! Facility presets the scope can be centered on.

use serde::Serialize;

use crate::types::{LatLon, Result, ScopeError};

/// A selectable airport view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Facility {
    pub id: &'static str,
    pub name: &'static str,
    pub center: LatLon,
    pub zoom: u8,
    /// METAR station polled for the weather line.
    pub station: &'static str,
    /// Static overlay boundary file drawn under the targets.
    pub boundary_file: &'static str,
}

pub const FACILITIES: &[Facility] = &[
    Facility {
        id: "JFK",
        name: "John F. Kennedy International",
        center: LatLon {
            lat: 40.6413,
            lon: -73.7781,
        },
        zoom: 10,
        station: "KJFK",
        boundary_file: "jfk-boundary.geojson",
    },
    Facility {
        id: "LGA",
        name: "LaGuardia",
        center: LatLon {
            lat: 40.7769,
            lon: -73.8740,
        },
        zoom: 11,
        station: "KLGA",
        boundary_file: "lga-boundary.geojson",
    },
    Facility {
        id: "EWR",
        name: "Newark Liberty International",
        center: LatLon {
            lat: 40.6895,
            lon: -74.1745,
        },
        zoom: 10,
        station: "KEWR",
        boundary_file: "ewr-boundary.geojson",
    },
];

pub const DEFAULT_FACILITY: &str = "JFK";

impl Facility {
    /// LiveATC feed search page for this facility's station.
    pub fn liveatc_url(&self) -> String {
        format!("https://www.liveatc.net/search/?icao={}", self.station)
    }
}

/// Case-insensitive lookup by facility id.
pub fn find(id: &str) -> Option<&'static Facility> {
    FACILITIES
        .iter()
        .find(|f| f.id.eq_ignore_ascii_case(id.trim()))
}

pub fn lookup(id: &str) -> Result<&'static Facility> {
    find(id).ok_or_else(|| ScopeError::UnknownFacility(id.to_string()))
}

pub fn default_facility() -> &'static Facility {
    &FACILITIES[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_presets() {
        let ids: Vec<_> = FACILITIES.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["JFK", "LGA", "EWR"]);
    }

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find("lga").unwrap().station, "KLGA");
        assert_eq!(find(" ewr ").unwrap().station, "KEWR");
        assert!(find("BOS").is_none());
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(matches!(lookup("XYZ"), Err(ScopeError::UnknownFacility(_))));
    }

    #[test]
    fn test_default_is_jfk() {
        assert_eq!(default_facility().id, DEFAULT_FACILITY);
        assert_eq!(default_facility().station, "KJFK");
    }

    #[test]
    fn test_liveatc_url() {
        assert_eq!(
            find("JFK").unwrap().liveatc_url(),
            "https://www.liveatc.net/search/?icao=KJFK"
        );
    }
}
