//! Playlist reconciliation
//!
//! Creates a playlist, searches the catalog for every recognized song and adds
//! whatever was found in one batch. A song that cannot be found, or whose
//! search fails, is recorded in the report and never aborts its siblings.

use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use snaplist_common::{AuthContext, MatchResult, PlaylistReport, SongCandidate, TokenValidity};
use std::sync::Arc;
use thiserror::Error;

use super::catalog_client::{CatalogBackend, CatalogError, TrackQuery};

/// Description attached to every generated playlist
pub const PLAYLIST_DESCRIPTION: &str = "Playlist created from image using AI";

/// Request-level reconciliation failures
///
/// Per-song search failures are not errors here; they end up in the report.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Credential is not usable ({0:?})")]
    Unauthorized(TokenValidity),

    #[error("No songs provided")]
    NoInput,

    #[error("Playlist creation failed: {0}")]
    PlaylistCreation(#[source] CatalogError),

    #[error("Adding tracks to playlist {playlist_id} failed: {source}")]
    TrackAdd {
        playlist_id: String,
        #[source]
        source: CatalogError,
    },
}

/// Reconciler tuning
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Concurrent catalog searches
    pub search_workers: usize,
    /// Create playlists as public
    pub playlist_public: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            search_workers: 4,
            playlist_public: false,
        }
    }
}

/// Human-readable playlist name stamped with the creation time
pub fn playlist_name(created_at: DateTime<Local>) -> String {
    format!("AI Playlist - {}", created_at.format("%Y-%m-%d %H:%M:%S"))
}

/// Builds playlists from recognized songs
pub struct PlaylistReconciler {
    catalog: Arc<dyn CatalogBackend>,
    options: ReconcilerOptions,
}

impl PlaylistReconciler {
    pub fn new(catalog: Arc<dyn CatalogBackend>, options: ReconcilerOptions) -> Self {
        Self { catalog, options }
    }

    /// Create a playlist holding every candidate the catalog can find
    ///
    /// The playlist is created before any search, so a run with no matches
    /// still leaves an empty playlist behind.
    pub async fn reconcile(
        &self,
        auth: &AuthContext,
        candidates: &[SongCandidate],
    ) -> Result<PlaylistReport, ReconcileError> {
        if !auth.is_valid() {
            return Err(ReconcileError::Unauthorized(auth.validity()));
        }

        if candidates.is_empty() {
            return Err(ReconcileError::NoInput);
        }

        let token = auth.access_token();
        let name = playlist_name(Local::now());

        let playlist_id = self
            .catalog
            .create_playlist(token, &name, PLAYLIST_DESCRIPTION, self.options.playlist_public)
            .await
            .map_err(ReconcileError::PlaylistCreation)?;

        tracing::info!(
            playlist_id = %playlist_id,
            songs = candidates.len(),
            workers = self.options.search_workers,
            "Matching songs against catalog"
        );

        // Futures are built up front so the stream owns them; `buffered` yields
        // in input order, so each result lands in its own slot
        let pending: Vec<_> = candidates
            .iter()
            .map(|candidate| self.match_candidate(token, candidate))
            .collect();
        let results: Vec<MatchResult> = stream::iter(pending)
            .buffered(self.options.search_workers.max(1))
            .collect()
            .await;

        let report = PlaylistReport::from_results(playlist_id, results);

        if report.tracks_added > 0 {
            self.catalog
                .add_tracks(token, &report.playlist_id, &report.track_ids())
                .await
                .map_err(|source| ReconcileError::TrackAdd {
                    playlist_id: report.playlist_id.clone(),
                    source,
                })?;
        }

        tracing::info!(
            playlist_id = %report.playlist_id,
            matched = report.tracks_added,
            unmatched = report.unmatched.len(),
            total = report.total_songs,
            "Playlist reconciled"
        );

        Ok(report)
    }

    async fn match_candidate(&self, token: &str, candidate: &SongCandidate) -> MatchResult {
        let query = TrackQuery::new(candidate.artist.clone(), candidate.title.clone());

        match self.catalog.search_tracks(token, &query).await {
            Ok(tracks) => match tracks.into_iter().next() {
                Some(track) => {
                    tracing::debug!(
                        song = %candidate,
                        track_id = %track.id,
                        catalog_title = %track.name,
                        "Song matched"
                    );
                    MatchResult::matched(candidate, track.id, track.name, track.artist_name)
                }
                None => {
                    tracing::debug!(song = %candidate, "Song not found in catalog");
                    MatchResult::not_found(candidate)
                }
            },
            Err(e) => {
                tracing::warn!(song = %candidate, error = %e, "Catalog search failed");
                MatchResult::search_error(candidate, e.to_string())
            }
        }
    }
}
