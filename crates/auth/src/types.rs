//! Token types shared between the credential store and the client layer.
//!
//! Defines the access/refresh token pair persisted by a
//! [`CredentialStore`](crate::store::CredentialStore) and the error type
//! returned by a failed [`TokenRefresher`](crate::refresher::TokenRefresher)
//! exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access and refresh tokens with optional expiry metadata
///
/// - Optional refresh token (some providers don't issue one on every
///   exchange; an omitted refresh token means "keep the previous one")
/// - Optional absolute expiry so stores can answer authentication checks
///   without decoding the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token presented as the Authorization credential
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp (UTC), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    /// Create a token pair holding only an access token
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None, expires_at: None }
    }

    /// Attach a refresh token
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Attach an absolute expiry timestamp
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Attach an expiry `lifetime_seconds` from now
    #[must_use]
    pub fn with_lifetime(mut self, lifetime_seconds: i64) -> Self {
        self.expires_at = Some(Utc::now() + chrono::Duration::seconds(lifetime_seconds));
        self
    }

    /// Check if the access token is expired or will expire within the given
    /// threshold
    ///
    /// # Arguments
    /// * `threshold_seconds` - Number of seconds before expiry to consider
    ///   expired
    ///
    /// # Returns
    /// `true` if the token is expired or will expire within the threshold,
    /// `false` if it's still valid beyond the threshold or if no expiry is set
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let threshold = chrono::Duration::seconds(threshold_seconds);
                Utc::now() + threshold >= expires_at
            }
            None => false, // If no expiry set, assume not expired
        }
    }

    /// Get seconds until token expiration
    ///
    /// # Returns
    /// `Some(seconds)` if expiry is set, `None` if no expiry timestamp exists
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }

    /// Format the access token as an Authorization header value
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Error type for refresh-token exchanges
///
/// Produced by [`TokenRefresher`](crate::refresher::TokenRefresher)
/// implementations. The client treats every variant the same way (the
/// refresh cycle fails and waiting requests are rejected); the split
/// exists so callers can distinguish a dead session from a flaky network
/// when deciding whether to force a sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token is available to exchange
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The authorization server rejected the refresh token
    #[error("refresh rejected: {0}")]
    Rejected(String),

    /// The exchange could not be completed (connectivity, 5xx, parse)
    #[error("refresh failed: {0}")]
    Transport(String),
}
