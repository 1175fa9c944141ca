//! Data-block formatting for scope targets.
//!
//! A full data block is three short lines: callsign, altitude code plus
//! ground-speed tens, and aircraft type. Missing values render as fixed
//! placeholders so block width never changes.

use serde::Serialize;

use crate::tracker::Track;

pub const ALTITUDE_PLACEHOLDER: &str = "---";
pub const CALLSIGN_PLACEHOLDER: &str = "UNKN";
pub const TYPE_PLACEHOLDER: &str = "----";
pub const SPEED_PLACEHOLDER: &str = "--";

/// Hundreds-of-feet altitude code, zero-padded to three digits.
///
/// `round(alt / 100)` clamped to 0..=999; unresolved altitude renders `---`.
pub fn altitude_code(alt_ft: Option<f64>) -> String {
    match alt_ft.filter(|a| a.is_finite()) {
        Some(alt) => {
            let code = (alt / 100.0).round().clamp(0.0, 999.0) as u16;
            format!("{code:03}")
        }
        None => ALTITUDE_PLACEHOLDER.to_string(),
    }
}

/// Ground speed in tens of knots, two digits (`25` for 250 kt).
pub fn speed_code(gs_kts: Option<f64>) -> String {
    match gs_kts.filter(|g| g.is_finite() && *g >= 0.0) {
        Some(gs) => {
            let code = (gs / 10.0).round().min(99.0) as u8;
            format!("{code:02}")
        }
        None => SPEED_PLACEHOLDER.to_string(),
    }
}

fn or_placeholder(val: Option<&str>, placeholder: &str) -> String {
    match val.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => placeholder.to_string(),
    }
}

pub fn callsign_label(callsign: Option<&str>) -> String {
    or_placeholder(callsign, CALLSIGN_PLACEHOLDER)
}

pub fn type_label(aircraft_type: Option<&str>) -> String {
    or_placeholder(aircraft_type, TYPE_PLACEHOLDER)
}

/// Display fields for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBlock {
    pub callsign: String,
    pub altitude: String,
    pub speed: String,
    pub aircraft_type: String,
}

impl DataBlock {
    pub fn from_track(track: &Track) -> Self {
        DataBlock {
            callsign: callsign_label(track.callsign_text()),
            altitude: altitude_code(track.altitude_ft()),
            speed: speed_code(track.gs_kts),
            aircraft_type: type_label(track.aircraft_type.as_deref()),
        }
    }

    pub fn lines(&self) -> [String; 3] {
        [
            self.callsign.clone(),
            format!("{} {}", self.altitude, self.speed),
            self.aircraft_type.clone(),
        ]
    }
}
