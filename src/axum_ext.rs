//! Axum integration: serve the dashboard as JSON.
//!
//! The refresh loop owns the sensor and writes into a [`SharedDashboard`];
//! the display polls `GET /api/dashboard` for the latest frame.
//!
//! # Example
//!
//! ```rust,ignore
//! use roomclock::axum_ext::{router, SharedDashboard};
//!
//! let state = SharedDashboard::default();
//! let app = router(state.clone());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

use std::sync::{Arc, RwLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::Status;

/// Dashboard shared between the refresh loop and request handlers.
pub type SharedDashboard = Arc<RwLock<Dashboard>>;

type Rejection = (StatusCode, &'static str);

fn poisoned<T>(_: T) -> Rejection {
    tracing::error!("Dashboard lock poisoned");
    (StatusCode::INTERNAL_SERVER_ERROR, "dashboard unavailable")
}

/// GET /api/dashboard - frame for the current time in the dashboard's
/// timezone.
pub async fn dashboard(
    State(state): State<SharedDashboard>,
) -> Result<Json<DashboardSnapshot>, Rejection> {
    let dashboard = state.read().map_err(poisoned)?;
    Ok(Json(dashboard.snapshot_at(chrono::Utc::now())))
}

/// GET /api/room - latest room sensor status.
///
/// 503 until the sensor has reported once.
pub async fn room(State(state): State<SharedDashboard>) -> Result<Json<Status>, Rejection> {
    let dashboard = state.read().map_err(poisoned)?;
    dashboard
        .room()
        .cloned()
        .map(Json)
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "no room reading yet"))
}

/// Routes for the dashboard API.
pub fn router(state: SharedDashboard) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/room", get(room))
        .with_state(state)
}
