//! Scope state route handlers.
//!
//! Reads come straight from the live session; writes (facility switch, tag
//! toggle) mutate it under the same lock the poller uses.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use scope_core::facility::{self, FACILITIES};

use crate::poller::now_ms;
use crate::web::{error_response, AppState};

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session = state.session.read().unwrap();
    Json(json!({
        "status": "ok",
        "facility": session.facility().id,
        "tracks": session.store().len(),
        "polling": state.scheduler.as_ref().is_some_and(|s| s.is_running()),
    }))
}

/// GET /api/facilities
///
/// The selectable presets.
pub async fn api_facilities() -> Json<Value> {
    let list: Vec<Value> = FACILITIES
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "name": f.name,
                "center": f.center,
                "zoom": f.zoom,
                "station": f.station,
                "boundary_file": f.boundary_file,
                "liveatc_url": f.liveatc_url(),
            })
        })
        .collect();
    Json(json!(list))
}

/// GET /api/scope
///
/// Current frame: facility, weather, targets.
pub async fn api_scope(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.session.read().unwrap().view(now_ms());
    Json(view)
}

/// POST /api/scope/facility/:id
///
/// Switch facility and restart polling.
pub async fn api_switch_facility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let target = match facility::lookup(&id) {
        Ok(f) => f,
        Err(e) => return error_response(&e).into_response(),
    };

    let generation = state.session.write().unwrap().switch_facility(target);
    if let Some(scheduler) = &state.scheduler {
        scheduler.restart();
    }
    info!(facility = target.id, generation, "facility switched");

    (
        StatusCode::OK,
        Json(json!({"facility": target.id, "generation": generation})),
    )
        .into_response()
}

/// POST /api/scope/tags
///
/// Toggle data blocks.
pub async fn api_toggle_tags(State(state): State<Arc<AppState>>) -> Json<Value> {
    let show_tags = state.session.write().unwrap().toggle_tags();
    Json(json!({"show_tags": show_tags}))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
