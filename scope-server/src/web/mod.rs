//! Web server: axum routes for the upstream proxies and scope state.
//!
//! Shared state holds the live session (the same handle the poller writes
//! to), the upstream used by the proxy routes, and the scheduler so a
//! facility switch can restart polling.

use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use scope_core::config::Config;
use scope_core::types::{Result, ScopeError};
use scope_core::{facility, Session, TrackStore};

use crate::poller::{PollSettings, Poller, Scheduler, SharedSession};
use crate::upstream::{HttpUpstream, Upstream};

pub mod proxy;
pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub session: SharedSession,
    pub upstream: Arc<dyn Upstream>,
    /// `None` when the server only proxies (and in route tests).
    pub scheduler: Option<Scheduler>,
    pub radius_nm: f64,
}

/// Map an error onto the JSON error body the proxy routes return.
pub fn error_response(err: &ScopeError) -> (StatusCode, Json<Value>) {
    match err {
        ScopeError::UpstreamStatus { status, .. } => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({"error": err.to_string(), "status": status})),
        ),
        ScopeError::UnknownFacility(_) => {
            (StatusCode::NOT_FOUND, Json(json!({"error": err.to_string()})))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        ),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/traffic", get(proxy::api_traffic))
        .route("/api/metar", get(proxy::api_metar))
        .route("/api/facilities", get(routes::api_facilities))
        .route("/api/scope", get(routes::api_scope))
        .route("/api/scope/facility/:id", post(routes::api_switch_facility))
        .route("/api/scope/tags", post(routes::api_toggle_tags))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the live state from config: session, HTTP upstream, poller.
pub fn live_state(config: &Config) -> Result<Arc<AppState>> {
    let start = facility::lookup(&config.scope.facility)?;
    let store = TrackStore::new(config.scope.ttl_ms, config.scope.min_altitude_ft);
    let session: SharedSession = Arc::new(RwLock::new(Session::new(start, store)));

    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(&config.upstream)?);
    let poller = Poller::new(
        session.clone(),
        upstream.clone(),
        PollSettings::from_config(config),
    );

    Ok(Arc::new(AppState {
        session,
        upstream,
        scheduler: Some(Scheduler::new(poller)),
        radius_nm: config.upstream.radius_nm,
    }))
}

/// Start polling and serve until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let state = live_state(config)?;
    if let Some(scheduler) = &state.scheduler {
        scheduler.restart();
    }

    let app = build_router(state.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("scope server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(scheduler) = &state.scheduler {
        scheduler.shutdown().await;
    }
    info!("scope server stopped");
    Ok(())
}
