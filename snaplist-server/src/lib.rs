//! snaplist-server library interface
//!
//! Exposes the application state, router and services for the binary and for
//! integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use snaplist_common::config::{Environment, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::services::{
    GeminiClient, PlaylistReconciler, RecognitionExtractor, ReconcilerOptions, SpotifyClient,
    SpotifyTokenRefresher, TokenRefresher,
};

/// Default upload cap when none is configured (10 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the image cap
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Image → song candidates
    pub extractor: Arc<RecognitionExtractor>,
    /// Song candidates → playlist report
    pub reconciler: Arc<PlaylistReconciler>,
    /// Exchanges refresh tokens when the presented credential has expired
    pub token_refresher: Option<Arc<dyn TokenRefresher>>,
    /// Deployment environment (controls error detail exposure)
    pub environment: Environment,
    /// Upload cap in bytes
    pub max_image_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        extractor: RecognitionExtractor,
        reconciler: PlaylistReconciler,
        environment: Environment,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            reconciler: Arc::new(reconciler),
            token_refresher: None,
            environment,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            startup_time: Utc::now(),
        }
    }

    pub fn with_token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.token_refresher = Some(refresher);
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Wire the production Gemini and Spotify clients from configuration
    pub fn from_config(toml_config: &TomlConfig) -> snaplist_common::Result<Self> {
        use snaplist_common::Error;

        let timeout = Duration::from_millis(toml_config.request_timeout_ms);

        let api_key = config::resolve_vision_api_key(toml_config)?;
        let vision = GeminiClient::new(
            api_key,
            toml_config.vision.model.clone(),
            toml_config.vision.base_url.clone(),
            timeout,
        )
        .map_err(|e| Error::Internal(format!("Vision client setup failed: {}", e)))?;

        let catalog_config = &toml_config.catalog;
        let catalog = SpotifyClient::new(
            catalog_config.api_base_url.clone(),
            timeout,
            catalog_config.min_request_interval_ms,
            catalog_config.search_result_limit,
        )
        .map_err(|e| Error::Internal(format!("Catalog client setup failed: {}", e)))?;

        let reconciler = PlaylistReconciler::new(
            Arc::new(catalog),
            ReconcilerOptions {
                search_workers: catalog_config.search_workers,
                playlist_public: catalog_config.playlist_public,
            },
        );

        let mut state = AppState::new(
            RecognitionExtractor::new(Arc::new(vision)),
            reconciler,
            toml_config.environment,
        )
        .with_max_image_bytes(toml_config.max_image_bytes);

        if let Some((client_id, client_secret)) = config::resolve_catalog_credentials(toml_config) {
            let refresher = SpotifyTokenRefresher::new(
                catalog_config.accounts_base_url.clone(),
                client_id,
                client_secret,
                timeout,
            )
            .map_err(|e| Error::Internal(format!("Token refresher setup failed: {}", e)))?;
            state = state.with_token_refresher(Arc::new(refresher));
        }

        Ok(state)
    }

    /// Whether 500 responses may carry the underlying error message
    pub fn expose_error_details(&self) -> bool {
        self.environment.is_development()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::playlist_routes(state.clone()))
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(
            state.max_image_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
