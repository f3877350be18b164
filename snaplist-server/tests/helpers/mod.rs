//! Test Helper Utilities
//!
//! In-memory vision, catalog and token backends for exercising the router
//! without network access.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use snaplist_common::config::Environment;
use snaplist_common::TokenGrant;
use snaplist_server::services::{
    AuthError, CatalogBackend, CatalogError, PlaylistReconciler, RecognitionError,
    RecognitionExtractor, ReconcilerOptions, TokenRefresher, TrackDescriptor, TrackQuery,
    VisionBackend,
};
use snaplist_server::{build_router, AppState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Smallest PNG signature `infer` recognizes
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

pub const MULTIPART_BOUNDARY: &str = "snaplist-test-boundary";

/// Vision backend returning a canned reply
pub struct FakeVision {
    reply: Mutex<Option<Result<String, RecognitionError>>>,
    pub calls: AtomicUsize,
    pub seen_mime: Mutex<Option<String>>,
}

impl FakeVision {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(err: RecognitionError) -> Arc<Self> {
        Self::with_result(Err(err))
    }

    fn with_result(result: Result<String, RecognitionError>) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(result)),
            calls: AtomicUsize::new(0),
            seen_mime: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionBackend for FakeVision {
    fn backend_id(&self) -> &'static str {
        "fake-vision"
    }

    async fn generate(
        &self,
        _image: &[u8],
        mime_type: &str,
        _prompt: &str,
    ) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_mime.lock().unwrap() = Some(mime_type.to_string());
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Catalog backend with a fixed set of known songs
#[derive(Default)]
pub struct FakeCatalog {
    /// "artist|title" → track id
    known: HashMap<String, String>,
    /// titles whose search fails
    failing_titles: Vec<String>,
    fail_create: Option<fn() -> CatalogError>,
    fail_add: bool,
    pub created: Mutex<Vec<String>>,
    pub searches: Mutex<Vec<TrackQuery>>,
    pub added: Mutex<Vec<(String, Vec<String>)>>,
    pub tokens: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, artist: &str, title: &str, id: &str) -> Self {
        self.known.insert(format!("{}|{}", artist, title), id.to_string());
        self
    }

    pub fn with_failing_search(mut self, title: &str) -> Self {
        self.failing_titles.push(title.to_string());
        self
    }

    pub fn with_create_failure(mut self, err: fn() -> CatalogError) -> Self {
        self.fail_create = Some(err);
        self
    }

    pub fn with_add_failure(mut self) -> Self {
        self.fail_add = true;
        self
    }

    pub fn backend_calls(&self) -> usize {
        self.created.lock().unwrap().len()
            + self.searches.lock().unwrap().len()
            + self.added.lock().unwrap().len()
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogBackend for FakeCatalog {
    async fn create_playlist(
        &self,
        access_token: &str,
        name: &str,
        _description: &str,
        _is_public: bool,
    ) -> Result<String, CatalogError> {
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.created.lock().unwrap().push(name.to_string());
        match self.fail_create {
            Some(err) => Err(err()),
            None => Ok("playlist-1".to_string()),
        }
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &TrackQuery,
    ) -> Result<Vec<TrackDescriptor>, CatalogError> {
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.searches.lock().unwrap().push(query.clone());

        if self.failing_titles.contains(&query.title) {
            return Err(CatalogError::ApiError(502, "bad gateway".to_string()));
        }

        Ok(self
            .known
            .get(&format!("{}|{}", query.artist, query.title))
            .map(|id| TrackDescriptor {
                id: id.clone(),
                name: query.title.clone(),
                artist_name: query.artist.clone(),
            })
            .into_iter()
            .collect())
    }

    async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), CatalogError> {
        self.tokens.lock().unwrap().push(access_token.to_string());
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_ids.to_vec()));
        if self.fail_add {
            return Err(CatalogError::ApiError(500, "add failed".to_string()));
        }
        Ok(())
    }
}

/// Token refresher handing out a fixed token
pub struct FakeRefresher {
    pub calls: AtomicUsize,
    fail: bool,
}

impl FakeRefresher {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub const REFRESHED_TOKEN: &str = "refreshed-token";

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, grant: &TokenGrant) -> Result<TokenGrant, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::RefreshFailed("invalid_grant".to_string()));
        }
        Ok(TokenGrant {
            access_token: REFRESHED_TOKEN.to_string(),
            refresh_token: grant.refresh_token.clone(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        })
    }
}

/// Application state over the given fakes
pub fn test_state(
    vision: Arc<FakeVision>,
    catalog: Arc<FakeCatalog>,
    refresher: Option<Arc<FakeRefresher>>,
    environment: Environment,
) -> AppState {
    let mut state = AppState::new(
        RecognitionExtractor::new(vision),
        PlaylistReconciler::new(catalog, ReconcilerOptions::default()),
        environment,
    );
    if let Some(refresher) = refresher {
        state = state.with_token_refresher(refresher);
    }
    state
}

/// Build a router over the given fakes
pub fn test_app(
    vision: Arc<FakeVision>,
    catalog: Arc<FakeCatalog>,
    refresher: Option<Arc<FakeRefresher>>,
    environment: Environment,
) -> axum::Router {
    build_router(test_state(vision, catalog, refresher, environment))
}

/// PNG signature padded with zeros to exactly `len` bytes
pub fn png_of_len(len: usize) -> Vec<u8> {
    let mut bytes = PNG_BYTES.to_vec();
    bytes.resize(len, 0);
    bytes
}

/// Multipart body with one file field
pub fn multipart_body(field: &str, content_type: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload\"\r\n",
            field
        )
        .as_bytes(),
    );
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub fn image_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/process-image")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn playlist_request(headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/create-playlist")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
