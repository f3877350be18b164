//! Bootstrap configuration loading
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SNAPLIST_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/snaplist/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing config file is not fatal: a warning is logged and the compiled
//! defaults are used. A file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SNAPLIST_CONFIG";

/// Deployment environment
///
/// Controls whether internal error messages are exposed in 500 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// Timeout applied to every outbound HTTP call (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Largest accepted image upload (bytes)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Vision model backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    /// API key (environment variable takes priority)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_vision_base_url")]
    pub base_url: String,
}

/// Streaming catalog backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// OAuth client id, used only for token refresh
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret, used only for token refresh
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_catalog_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_catalog_accounts_base_url")]
    pub accounts_base_url: String,

    /// Concurrent per-song searches
    #[serde(default = "default_search_workers")]
    pub search_workers: usize,

    /// Results requested per search (only the first is used)
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: u32,

    /// Minimum spacing between catalog calls (milliseconds)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Whether created playlists are public
    #[serde(default)]
    pub playlist_public: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_vision_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_vision_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_catalog_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_catalog_accounts_base_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_search_workers() -> usize {
    4
}

fn default_search_result_limit() -> u32 {
    5
}

fn default_min_request_interval_ms() -> u64 {
    50
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            environment: Environment::default(),
            request_timeout_ms: default_request_timeout_ms(),
            max_image_bytes: default_max_image_bytes(),
            logging: LoggingConfig::default(),
            vision: VisionConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_vision_model(),
            base_url: default_vision_base_url(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: default_catalog_api_base_url(),
            accounts_base_url: default_catalog_accounts_base_url(),
            search_workers: default_search_workers(),
            search_result_limit: default_search_result_limit(),
            min_request_interval_ms: default_min_request_interval_ms(),
            playlist_public: false,
        }
    }
}

impl TomlConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.catalog.search_workers == 0 {
            return Err(Error::Config(
                "catalog.search_workers must be at least 1".to_string(),
            ));
        }
        if self.catalog.search_result_limit == 0 {
            return Err(Error::Config(
                "catalog.search_result_limit must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("snaplist").join("config.toml"))
}

/// Resolve which config file to read
///
/// Returns `None` when neither the CLI nor the environment names a file and
/// the platform default does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load bootstrap configuration, falling back to compiled defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    // Priority 4: Compiled defaults
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let config = read_toml_config(&path)?;
    info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}
