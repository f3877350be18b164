//! Bearer credential model
//!
//! The session and OAuth flow live in an external auth collaborator. Each
//! request hands the service an access token and a validity flag; the service
//! only reads them. Refreshing an expired token is an explicit function from
//! one [`TokenGrant`] to the next, never shared mutable state.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker the auth collaborator sends when its own refresh attempt failed
pub const REFRESH_FAILED_MARKER: &str = "RefreshAccessTokenError";

/// Validity of a bearer credential as seen by this request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenValidity {
    /// Token present and not past its expiry
    Valid,
    /// Token present but past its expiry
    Expired,
    /// The last refresh attempt failed
    RefreshFailed,
    /// No token supplied
    Missing,
}

/// Bearer credential for one request
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    access_token: String,
    validity: TokenValidity,
}

impl AuthContext {
    pub fn new(access_token: impl Into<String>, validity: TokenValidity) -> Self {
        let access_token = access_token.into();
        let validity = if access_token.trim().is_empty() {
            TokenValidity::Missing
        } else {
            validity
        };
        Self {
            access_token,
            validity,
        }
    }

    /// Context for a request that carried no credential
    pub fn missing() -> Self {
        Self {
            access_token: String::new(),
            validity: TokenValidity::Missing,
        }
    }

    /// Derive validity from what the auth collaborator supplied
    ///
    /// `expires_at` is Unix seconds; `auth_error` is the collaborator's error
    /// marker, if any.
    pub fn from_parts(
        access_token: Option<&str>,
        expires_at: Option<i64>,
        auth_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(token) = access_token.filter(|t| !t.trim().is_empty()) else {
            return Self::missing();
        };

        let validity = if auth_error == Some(REFRESH_FAILED_MARKER) {
            TokenValidity::RefreshFailed
        } else if expires_at.is_some_and(|at| now.timestamp() > at) {
            TokenValidity::Expired
        } else {
            TokenValidity::Valid
        };

        Self::new(token, validity)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn validity(&self) -> TokenValidity {
        self.validity
    }

    pub fn is_valid(&self) -> bool {
        self.validity == TokenValidity::Valid
    }
}

// Keep tokens out of logs.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &"<redacted>")
            .field("validity", &self.validity)
            .finish()
    }
}

/// Access token with its refresh token and expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
}

impl TokenGrant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    /// Context that uses this grant's access token
    pub fn to_context(&self, now: DateTime<Utc>) -> AuthContext {
        let validity = if self.is_expired_at(now) {
            TokenValidity::Expired
        } else {
            TokenValidity::Valid
        };
        AuthContext::new(self.access_token.clone(), validity)
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
