//! scope-core: track store and display logic for the radar scope.
//!
//! No async, no I/O, just algorithms. The server owns the network and the
//! timers; this crate turns polled aircraft lists into labeled,
//! vector-projected targets.

pub mod config;
pub mod facility;
pub mod geo;
pub mod label;
pub mod observation;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use facility::Facility;
pub use observation::{parse_feed, Altitude, Observation};
pub use session::{ScopeView, Session, Target};
pub use tracker::{MergeReport, Track, TrackStore};
pub use types::*;
