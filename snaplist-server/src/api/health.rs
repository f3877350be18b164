//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Build identification captured by build.rs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub git_hash: String,
    pub timestamp: String,
    pub profile: String,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("snaplist-server")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    pub build: BuildInfo,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "snaplist-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: BuildInfo {
            git_hash: env!("GIT_HASH").to_string(),
            timestamp: env!("BUILD_TIMESTAMP").to_string(),
            profile: env!("BUILD_PROFILE").to_string(),
        },
        uptime_seconds,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
