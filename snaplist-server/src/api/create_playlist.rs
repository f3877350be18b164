//! POST /create-playlist
//!
//! Builds a catalog playlist from a list of recognized songs and reports which
//! songs made it in.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use snaplist_common::{AuthContext, MatchedSong, PlaylistReport, SongCandidate, UnmatchedSong};
use tracing::{error, warn};

use crate::error::{ApiError, ApiResult};
use crate::services::{CatalogError, ReconcileError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub songs: Vec<SongCandidate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistResponse {
    pub success: bool,
    pub playlist_id: String,
    pub tracks_added: usize,
    pub total_songs: usize,
    pub failed_songs: Vec<UnmatchedSong>,
    pub success_songs: Vec<MatchedSong>,
}

impl From<PlaylistReport> for CreatePlaylistResponse {
    fn from(report: PlaylistReport) -> Self {
        Self {
            success: true,
            playlist_id: report.playlist_id,
            tracks_added: report.tracks_added,
            total_songs: report.total_songs,
            failed_songs: report.unmatched,
            success_songs: report.matched,
        }
    }
}

fn map_reconcile_error(err: ReconcileError, expose_detail: bool) -> ApiError {
    match err {
        ReconcileError::Unauthorized(validity) => {
            warn!(?validity, "Reconcile refused credential");
            ApiError::Unauthorized("No valid session".to_string())
        }
        ReconcileError::NoInput => ApiError::BadRequest("No songs provided".to_string()),
        ReconcileError::PlaylistCreation(CatalogError::Unauthorized) => {
            warn!("Catalog rejected the access token");
            ApiError::Unauthorized("Catalog rejected the access token".to_string())
        }
        err @ ReconcileError::PlaylistCreation(_) => {
            error!(error = %err, "Playlist creation failed");
            ApiError::internal("Failed to create playlist", &err, expose_detail)
        }
        err @ ReconcileError::TrackAdd { .. } => {
            error!(error = %err, "Adding tracks failed");
            ApiError::internal("Failed to add tracks to playlist", &err, expose_detail)
        }
    }
}

/// POST /create-playlist
pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> ApiResult<Json<CreatePlaylistResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let report = state
        .reconciler
        .reconcile(&auth, &request.songs)
        .await
        .map_err(|e| map_reconcile_error(e, state.expose_error_details()))?;

    Ok(Json(report.into()))
}
