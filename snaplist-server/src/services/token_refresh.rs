//! Access token refresh
//!
//! Exchanges a refresh token for a new access token at the catalog's OAuth
//! token endpoint. Refreshing is a plain function of the current grant: the
//! caller decides when to invoke it and what to do with the result.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use snaplist_common::TokenGrant;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("snaplist/", env!("CARGO_PKG_VERSION"));

/// Credential errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No valid session")]
    MissingCredential,

    #[error("Access token expired")]
    Expired,

    #[error("Failed to refresh access token: {0}")]
    RefreshFailed(String),
}

/// Turns a grant with a refresh token into a fresh grant
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, grant: &TokenGrant) -> Result<TokenGrant, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Build the next grant from a token endpoint response
///
/// The endpoint may omit the refresh token, in which case the old one stays
/// in use.
fn next_grant(previous: &TokenGrant, response: TokenResponse, now: DateTime<Utc>) -> TokenGrant {
    TokenGrant {
        access_token: response.access_token,
        refresh_token: response
            .refresh_token
            .or_else(|| previous.refresh_token.clone()),
        expires_at: now.timestamp() + response.expires_in,
    }
}

/// Spotify accounts service refresher (client credentials in Basic auth)
pub struct SpotifyTokenRefresher {
    http_client: reqwest::Client,
    accounts_base_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyTokenRefresher {
    pub fn new(
        accounts_base_url: String,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            accounts_base_url: accounts_base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        })
    }

    fn basic_auth_header(&self) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }
}

#[async_trait]
impl TokenRefresher for SpotifyTokenRefresher {
    async fn refresh(&self, grant: &TokenGrant) -> Result<TokenGrant, AuthError> {
        let refresh_token = grant
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token".to_string()))?;

        let url = format!("{}/api/token", self.accounts_base_url);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, self.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Token refresh rejected");
            return Err(AuthError::RefreshFailed(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let next = next_grant(grant, body, Utc::now());
        tracing::info!(expires_at = next.expires_at, "Access token refreshed");
        Ok(next)
    }
}
