//! Recognition, catalog and credential services

pub mod catalog_client;
pub mod playlist_reconciler;
pub mod song_extractor;
pub mod token_refresh;
pub mod vision_client;

#[cfg(test)]
pub(crate) mod stub_server;

pub use catalog_client::{CatalogBackend, CatalogError, SpotifyClient, TrackDescriptor, TrackQuery};
pub use playlist_reconciler::{PlaylistReconciler, ReconcileError, ReconcilerOptions};
pub use song_extractor::{parse_song_list, RecognitionExtractor};
pub use token_refresh::{AuthError, SpotifyTokenRefresher, TokenRefresher};
pub use vision_client::{GeminiClient, RecognitionError, VisionBackend};
