//! Thin proxies to the upstream ADS-B and METAR services.
//!
//! Bodies pass through verbatim. Upstream HTTP errors keep their status;
//! anything else is a 500.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use scope_core::facility;
use scope_core::types::LatLon;

use crate::upstream::valid_station;
use crate::web::{error_response, AppState};

const DEFAULT_STATION: &str = "KJFK";

#[derive(Deserialize)]
pub struct TrafficParams {
    lat: Option<f64>,
    lon: Option<f64>,
    dist: Option<f64>,
}

#[derive(Deserialize)]
pub struct MetarParams {
    ids: Option<String>,
}

/// Range check for the query values spliced into the upstream URL.
fn invalid_area(center: LatLon, dist: f64) -> Option<&'static str> {
    if !(center.lat.is_finite() && (-90.0..=90.0).contains(&center.lat)) {
        return Some("lat must be within -90..90");
    }
    if !(center.lon.is_finite() && (-180.0..=180.0).contains(&center.lon)) {
        return Some("lon must be within -180..180");
    }
    if !(dist.is_finite() && dist > 0.0) {
        return Some("dist must be a positive number");
    }
    None
}

/// GET /api/traffic
///
/// Aircraft list around a point (default JFK).
pub async fn api_traffic(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrafficParams>,
) -> Response {
    let jfk = facility::default_facility().center;
    let center = LatLon::new(params.lat.unwrap_or(jfk.lat), params.lon.unwrap_or(jfk.lon));
    let dist = params.dist.unwrap_or(state.radius_nm);

    if let Some(reason) = invalid_area(center, dist) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": reason}))).into_response();
    }

    match state.upstream.traffic(center, dist).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(error = %e, "traffic proxy failed");
            error_response(&e).into_response()
        }
    }
}

/// GET /api/metar
///
/// Raw METAR text for `ids` (default KJFK).
pub async fn api_metar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetarParams>,
) -> Response {
    let ids = params
        .ids
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATION)
        .to_ascii_uppercase();

    if !valid_station(&ids) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid station id"})),
        )
            .into_response();
    }

    match state.upstream.metar(&ids).await {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response(),
        Err(e) => {
            warn!(error = %e, station = %ids, "metar proxy failed");
            error_response(&e).into_response()
        }
    }
}
