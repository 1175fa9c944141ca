//! Raw aircraft observations as delivered by the upstream ADS-B aircraft list.
//!
//! Upstream feeds are loosely typed: any field may be missing, `null`, or the
//! wrong type (`alt_baro` is the string `"ground"` for surface traffic). A
//! field only resolves when it has the expected JSON type; everything else is
//! treated as absent. The altitude fields are the exception: a non-numeric
//! value there is still a report, and replaces whatever the track held.

use serde_json::Value;

use crate::types::{LatLon, Result, ScopeError};

/// One altitude field as sent, present but possibly not a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Altitude {
    Feet(f64),
    /// `"ground"`, or any other non-numeric value.
    NonNumeric,
}

impl Altitude {
    pub fn feet(self) -> Option<f64> {
        match self {
            Altitude::Feet(ft) => Some(ft),
            Altitude::NonNumeric => None,
        }
    }
}

/// First numeric slot in `alt_baro`, `alt_geom`, `altitude` order.
pub fn first_altitude(slots: [Option<Altitude>; 3]) -> Option<f64> {
    slots.into_iter().flatten().find_map(Altitude::feet)
}

/// One element of a polled aircraft list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub hex: Option<String>,
    pub icao: Option<String>,
    pub flight: Option<String>,
    pub callsign: Option<String>,
    /// Aircraft type designator (`t` on the wire).
    pub aircraft_type: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub track: Option<f64>,
    pub gs: Option<f64>,
    pub alt_baro: Option<Altitude>,
    pub alt_geom: Option<Altitude>,
    pub altitude: Option<Altitude>,
    pub squawk: Option<String>,
}

fn number(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// `null` counts as absent, like every other field.
fn altitude(obj: &Value, key: &str) -> Option<Altitude> {
    match obj.get(key)? {
        Value::Null => None,
        val => Some(match val.as_f64().filter(|v| v.is_finite()) {
            Some(ft) => Altitude::Feet(ft),
            None => Altitude::NonNumeric,
        }),
    }
}

fn text(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Non-empty after trimming, returned trimmed.
fn trimmed(val: Option<&str>) -> Option<&str> {
    val.map(str::trim).filter(|s| !s.is_empty())
}

impl Observation {
    /// Read an observation out of one JSON array element.
    pub fn from_value(obj: &Value) -> Self {
        // Some feeds send squawk as a bare number.
        let squawk = text(obj, "squawk").or_else(|| {
            obj.get("squawk")
                .and_then(Value::as_u64)
                .map(|n| format!("{n:04}"))
        });

        Observation {
            hex: text(obj, "hex"),
            icao: text(obj, "icao"),
            flight: text(obj, "flight"),
            callsign: text(obj, "callsign"),
            aircraft_type: text(obj, "t"),
            lat: number(obj, "lat"),
            lon: number(obj, "lon"),
            track: number(obj, "track"),
            gs: number(obj, "gs"),
            alt_baro: altitude(obj, "alt_baro"),
            alt_geom: altitude(obj, "alt_geom"),
            altitude: altitude(obj, "altitude"),
            squawk,
        }
    }

    pub fn position(&self) -> Option<LatLon> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLon::new(lat, lon)),
            _ => None,
        }
    }

    /// First finite altitude among `alt_baro`, `alt_geom`, `altitude`.
    pub fn resolved_altitude(&self) -> Option<f64> {
        first_altitude([self.alt_baro, self.alt_geom, self.altitude])
    }

    /// Display callsign: `flight`, falling back to `callsign`, trimmed.
    pub fn callsign_text(&self) -> Option<String> {
        trimmed(self.flight.as_deref())
            .or_else(|| trimmed(self.callsign.as_deref()))
            .map(str::to_string)
    }

    /// Store key: hex address, ICAO address, trimmed flight, trimmed
    /// callsign, then the literal `"lat,lon"` string.
    ///
    /// The positional fallback changes every time the aircraft moves, so
    /// such targets never accumulate history.
    pub fn identity(&self) -> Option<String> {
        let id = self
            .hex
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.icao.as_deref().filter(|s| !s.is_empty()))
            .or_else(|| trimmed(self.flight.as_deref()))
            .or_else(|| trimmed(self.callsign.as_deref()));

        match id {
            Some(id) => Some(id.to_string()),
            None => self.position().map(|p| format!("{},{}", p.lat, p.lon)),
        }
    }
}

/// Parse an upstream aircraft-list body.
///
/// The array may sit under `ac` or `aircraft`; any other shape is an empty
/// batch. Only a body that is not JSON at all is an error.
pub fn parse_feed(body: &str) -> Result<Vec<Observation>> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| ScopeError::Decode(e.to_string()))?;

    let list = root
        .get("ac")
        .and_then(Value::as_array)
        .or_else(|| root.get("aircraft").and_then(Value::as_array));

    Ok(list
        .map(|items| items.iter().map(Observation::from_value).collect())
        .unwrap_or_default())
}
