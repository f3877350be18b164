//! Authentication middleware for snaplist-server
//!
//! The auth collaborator forwards the user's catalog credential with each
//! request:
//! - `Authorization: Bearer <token>` (required)
//! - `X-Token-Expires-At: <unix seconds>` (optional)
//! - `X-Refresh-Token: <token>` (optional, enables refresh of expired tokens)
//! - `X-Auth-Error: RefreshAccessTokenError` (optional, collaborator's own refresh failed)
//!
//! Requests without a usable credential get 401 before any backend call. A
//! token refreshed here is handed back in `X-Refreshed-Access-Token` and
//! `X-Refreshed-Expires-At` so the collaborator can store it.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use snaplist_common::{AuthContext, TokenGrant, TokenValidity};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::{AuthError, TokenRefresher};
use crate::AppState;

pub const EXPIRES_AT_HEADER: HeaderName = HeaderName::from_static("x-token-expires-at");
pub const REFRESH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refresh-token");
pub const AUTH_ERROR_HEADER: HeaderName = HeaderName::from_static("x-auth-error");
pub const REFRESHED_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refreshed-access-token");
pub const REFRESHED_EXPIRES_AT_HEADER: HeaderName =
    HeaderName::from_static("x-refreshed-expires-at");

/// Credential as presented on the request
#[derive(Debug, Clone)]
pub struct PresentedCredential {
    pub context: AuthContext,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl PresentedCredential {
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let bearer = header_str(headers, &AUTHORIZATION).and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
                .map(str::trim)
        });
        let expires_at = header_str(headers, &EXPIRES_AT_HEADER).and_then(|v| v.parse::<i64>().ok());
        let auth_error = header_str(headers, &AUTH_ERROR_HEADER);
        let refresh_token = header_str(headers, &REFRESH_TOKEN_HEADER).map(str::to_string);

        Self {
            context: AuthContext::from_parts(bearer, expires_at, auth_error, now),
            refresh_token,
            expires_at,
        }
    }
}

/// Turn a presented credential into a usable one
///
/// Expired tokens are refreshed once when a refresher and a refresh token are
/// available. Returns the context to use and, when a refresh happened, the
/// new grant.
pub async fn authorize(
    presented: PresentedCredential,
    refresher: Option<&dyn TokenRefresher>,
    now: DateTime<Utc>,
) -> Result<(AuthContext, Option<TokenGrant>), AuthError> {
    match presented.context.validity() {
        TokenValidity::Valid => Ok((presented.context, None)),
        TokenValidity::Missing => Err(AuthError::MissingCredential),
        TokenValidity::RefreshFailed => Err(AuthError::RefreshFailed(
            "reported by auth provider".to_string(),
        )),
        TokenValidity::Expired => {
            let (Some(refresher), Some(refresh_token)) = (refresher, presented.refresh_token) else {
                return Err(AuthError::Expired);
            };

            let current = TokenGrant {
                access_token: presented.context.access_token().to_string(),
                refresh_token: Some(refresh_token),
                expires_at: presented.expires_at.unwrap_or_default(),
            };

            let refreshed = refresher.refresh(&current).await?;
            let context = refreshed.to_context(now);
            if !context.is_valid() {
                return Err(AuthError::Expired);
            }

            Ok((context, Some(refreshed)))
        }
    }
}

fn attach_refreshed_grant(response: &mut Response, grant: &TokenGrant) {
    match HeaderValue::from_str(&grant.access_token) {
        Ok(token) => {
            let headers = response.headers_mut();
            headers.insert(REFRESHED_TOKEN_HEADER, token);
            headers.insert(REFRESHED_EXPIRES_AT_HEADER, HeaderValue::from(grant.expires_at));
        }
        Err(e) => warn!("Refreshed token is not a valid header value: {}", e),
    }
}

/// Authentication middleware
///
/// Inserts the usable [`AuthContext`] into request extensions for handlers.
/// Applied to the playlist routes only; `/health` is open.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    let presented = PresentedCredential::from_headers(request.headers(), now);

    let (context, refreshed) = authorize(presented, state.token_refresher.as_deref(), now)
        .await
        .map_err(|e| {
            warn!(path = %request.uri().path(), error = %e, "Rejecting request");
            ApiError::Unauthorized(e.to_string())
        })?;

    if let Some(grant) = &refreshed {
        info!(
            path = %request.uri().path(),
            expires_at = ?grant.expires_at_utc(),
            "Proceeding with refreshed access token"
        );
    }

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    if let Some(grant) = refreshed {
        attach_refreshed_grant(&mut response, &grant);
    }

    Ok(response)
}
