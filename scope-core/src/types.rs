//! Shared types and the error enum for scope-core.

use thiserror::Error;

/// All errors produced by the scope crates.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("{service} upstream returned HTTP {status}")]
    UpstreamStatus { service: &'static str, status: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid feed payload: {0}")]
    Decode(String),
    #[error("unknown facility: {0}")]
    UnknownFacility(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScopeError>;

/// Milliseconds since the Unix epoch. All store timestamps use this unit.
pub type Millis = i64;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        LatLon { lat, lon }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_message() {
        let err = ScopeError::UpstreamStatus {
            service: "traffic",
            status: 503,
        };
        assert_eq!(err.to_string(), "traffic upstream returned HTTP 503");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ScopeError = io.into();
        assert!(matches!(err, ScopeError::Io(_)));
    }
}
