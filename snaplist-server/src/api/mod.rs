//! HTTP API handlers for snaplist-server
//!
//! `/process-image` and `/create-playlist` require a catalog credential;
//! `/health` is open.

pub mod auth;
pub mod create_playlist;
pub mod health;
pub mod process_image;

use axum::{middleware, routing::post, Router};

use crate::AppState;

pub use create_playlist::{CreatePlaylistRequest, CreatePlaylistResponse};
pub use health::health_routes;
pub use process_image::ProcessImageResponse;

/// Build the authenticated playlist routes
pub fn playlist_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/process-image", post(process_image::process_image))
        .route("/create-playlist", post(create_playlist::create_playlist))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
