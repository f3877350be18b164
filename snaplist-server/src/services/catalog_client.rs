//! Streaming catalog client
//!
//! Playlist creation, structured track search and batch track addition
//! against the Spotify Web API, behind the [`CatalogBackend`] trait. Every
//! call carries the user's bearer token; the client itself holds no
//! credentials.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("snaplist/", env!("CARGO_PKG_VERSION"));

/// Most URIs the add-tracks endpoint accepts per request
pub const MAX_URIS_PER_REQUEST: usize = 100;

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Catalog request timed out")]
    Timeout,

    #[error("Catalog rejected the access token")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl CatalogError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else {
            CatalogError::NetworkError(err.to_string())
        }
    }
}

/// Structured search constrained by both fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackQuery {
    pub artist: String,
    pub title: String,
}

impl TrackQuery {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// Field-filtered query string, e.g. `track:Waterloo artist:ABBA`
    pub fn to_query_string(&self) -> String {
        format!("track:{} artist:{}", self.title, self.artist)
    }
}

/// One catalog search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub id: String,
    pub name: String,
    pub artist_name: String,
}

/// Catalog operations needed to build a playlist
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Create a playlist for the token's user; returns its id
    async fn create_playlist(
        &self,
        access_token: &str,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> Result<String, CatalogError>;

    /// Search tracks, best match first
    async fn search_tracks(
        &self,
        access_token: &str,
        query: &TrackQuery,
    ) -> Result<Vec<TrackDescriptor>, CatalogError>;

    /// Append tracks to a playlist in the given order
    async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError>;
}

#[derive(Debug, Serialize)]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
    description: &'a str,
    public: bool,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Serialize)]
struct AddTracksRequest {
    uris: Vec<String>,
}

impl From<SpotifyTrack> for TrackDescriptor {
    fn from(track: SpotifyTrack) -> Self {
        let artist_name = track
            .artists
            .into_iter()
            .next()
            .map(|artist| artist.name)
            .unwrap_or_default();

        Self {
            id: track.id,
            name: track.name,
            artist_name,
        }
    }
}

fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Limiter admitting one request per `min_request_interval_ms`
///
/// A zero interval disables pacing.
fn pacing_limiter(min_request_interval_ms: u64) -> Option<DirectRateLimiter> {
    Quota::with_period(Duration::from_millis(min_request_interval_ms)).map(RateLimiter::direct)
}

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    rate_limiter: Option<DirectRateLimiter>,
    base_url: String,
    search_limit: u32,
}

impl SpotifyClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        min_request_interval_ms: u64,
        search_limit: u32,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: pacing_limiter(min_request_interval_ms),
            base_url: base_url.trim_end_matches('/').to_string(),
            search_limit,
        })
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    /// Map non-success statuses onto catalog errors
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();

        if status == 401 {
            return Err(CatalogError::Unauthorized);
        }

        if status == 429 {
            return Err(CatalogError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CatalogError> {
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout
            } else {
                CatalogError::ParseError(e.to_string())
            }
        })
    }
}

#[async_trait]
impl CatalogBackend for SpotifyClient {
    async fn create_playlist(
        &self,
        access_token: &str,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> Result<String, CatalogError> {
        self.pace().await;

        let url = format!("{}/me/playlists", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&CreatePlaylistRequest {
                name,
                description,
                public: is_public,
            })
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;

        let playlist: PlaylistResponse = Self::read_json(Self::check_status(response).await?).await?;

        tracing::info!(playlist_id = %playlist.id, name = %name, "Created playlist");

        Ok(playlist.id)
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &TrackQuery,
    ) -> Result<Vec<TrackDescriptor>, CatalogError> {
        self.pace().await;

        let url = format!("{}/search", self.base_url);
        let q = query.to_query_string();
        let limit = self.search_limit.to_string();

        tracing::debug!(query = %q, "Searching catalog");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", q.as_str()), ("type", "track"), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;

        let body: SearchResponse = Self::read_json(Self::check_status(response).await?).await?;

        Ok(body
            .tracks
            .map(|page| page.items.into_iter().map(TrackDescriptor::from).collect())
            .unwrap_or_default())
    }

    async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError> {
        if track_ids.is_empty() {
            return Ok(());
        }

        let url = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);

        for chunk in track_ids.chunks(MAX_URIS_PER_REQUEST) {
            self.pace().await;

            let response = self
                .http_client
                .post(&url)
                .bearer_auth(access_token)
                .json(&AddTracksRequest {
                    uris: chunk.iter().map(|id| track_uri(id)).collect(),
                })
                .send()
                .await
                .map_err(CatalogError::from_reqwest)?;

            Self::check_status(response).await?;
        }

        tracing::info!(
            playlist_id = %playlist_id,
            tracks = track_ids.len(),
            "Added tracks to playlist"
        );

        Ok(())
    }
}
