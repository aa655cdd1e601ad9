//! `GET /api/health` liveness endpoint.

use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"` while the process can answer.
    pub status: String,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime: f64,
}

/// Router serving the health endpoint. `started` is the moment uptime is
/// measured from.
pub(crate) fn router(started: Instant) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .with_state(started)
}

async fn health(State(started): State<Instant>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: started.elapsed().as_secs_f64(),
    })
}
