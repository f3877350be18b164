//! Secret resolution for snaplist-server
//!
//! Provides two-tier resolution with ENV → TOML priority for the vision API
//! key and the catalog OAuth client credentials.

use snaplist_common::config::TomlConfig;
use snaplist_common::{Error, Result};
use tracing::{info, warn};

pub const VISION_API_KEY_ENV: &str = "SNAPLIST_GEMINI_API_KEY";
pub const CATALOG_CLIENT_ID_ENV: &str = "SNAPLIST_SPOTIFY_CLIENT_ID";
pub const CATALOG_CLIENT_SECRET_ENV: &str = "SNAPLIST_SPOTIFY_CLIENT_SECRET";

/// Validate secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one secret from the environment, then TOML
fn resolve_secret(env_var: &str, toml_value: Option<&String>, label: &str) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v)).cloned();

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", label);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(value);
    }

    None
}

/// Resolve the vision backend API key
///
/// **Priority:** ENV → TOML. Missing key is a startup error.
pub fn resolve_vision_api_key(toml_config: &TomlConfig) -> Result<String> {
    resolve_secret(
        VISION_API_KEY_ENV,
        toml_config.vision.api_key.as_ref(),
        "Vision API key",
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "Vision API key not configured. Please configure using one of:\n\
             1. Environment: {}=your-key-here\n\
             2. TOML config: [vision] api_key = \"your-key\"",
            VISION_API_KEY_ENV
        ))
    })
}

/// Resolve catalog OAuth client credentials
///
/// Both halves are required; without them token refresh is disabled and
/// expired credentials are rejected.
pub fn resolve_catalog_credentials(toml_config: &TomlConfig) -> Option<(String, String)> {
    let client_id = resolve_secret(
        CATALOG_CLIENT_ID_ENV,
        toml_config.catalog.client_id.as_ref(),
        "Catalog client id",
    );
    let client_secret = resolve_secret(
        CATALOG_CLIENT_SECRET_ENV,
        toml_config.catalog.client_secret.as_ref(),
        "Catalog client secret",
    );

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => Some((id, secret)),
        (None, None) => {
            info!("Catalog client credentials not configured; token refresh disabled");
            None
        }
        _ => {
            warn!("Only one of catalog client id/secret configured; token refresh disabled");
            None
        }
    }
}
