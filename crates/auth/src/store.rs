//! Credential store capability and the in-memory implementation
//!
//! The store is the single owner of token material. The client layer
//! reads the Authorization value through it and writes refreshed tokens
//! back through it; nothing else caches credentials.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::TokenPair;

/// Capability trait for credential persistence
///
/// Treated as an opaque key-value capability by the client: no wire or
/// storage format is prescribed. Methods are infallible at this boundary;
/// implementations backed by fallible storage log internally and degrade
/// (a read failure behaves like "no credential").
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Produce the Authorization header value for the current credential
    ///
    /// # Returns
    /// `Some("Bearer …")` when a usable access token is held, `None`
    /// otherwise. Callers omit the header on `None`.
    async fn authorization_header(&self) -> Option<String>;

    /// Persist a new access token, keeping any held refresh token
    ///
    /// Any expiry recorded for the replaced token is discarded: the new
    /// token's lifetime is unknown at this boundary.
    async fn save_access_token(&self, access_token: &str);

    /// Persist a new refresh token, keeping the held access token
    async fn save_refresh_token(&self, refresh_token: &str);

    /// Whether a usable (present, non-expired) credential is held
    async fn is_authenticated(&self) -> bool;

    /// Remove all persisted credential material
    async fn clear_all(&self);
}

/// In-memory credential store
///
/// Default store for tests and for applications that scope credentials
/// to the process lifetime. Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    tokens: Arc<RwLock<Option<TokenPair>>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing token pair
    #[must_use]
    pub fn with_tokens(pair: TokenPair) -> Self {
        Self { tokens: Arc::new(RwLock::new(Some(pair))) }
    }

    /// Replace the held token pair wholesale
    pub async fn put(&self, pair: TokenPair) {
        *self.tokens.write().await = Some(pair);
    }

    /// Snapshot the held token pair
    pub async fn current(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn authorization_header(&self) -> Option<String> {
        let guard = self.tokens.read().await;
        guard
            .as_ref()
            .filter(|pair| !pair.access_token.is_empty())
            .map(TokenPair::authorization_value)
    }

    async fn save_access_token(&self, access_token: &str) {
        let mut guard = self.tokens.write().await;
        match guard.as_mut() {
            Some(pair) => {
                pair.access_token = access_token.to_string();
                // The old expiry described the replaced token, not this one.
                pair.expires_at = None;
            }
            None => *guard = Some(TokenPair::new(access_token)),
        }
        debug!("access token updated");
    }

    async fn save_refresh_token(&self, refresh_token: &str) {
        let mut guard = self.tokens.write().await;
        match guard.as_mut() {
            Some(pair) => pair.refresh_token = Some(refresh_token.to_string()),
            // A refresh token can arrive before any access token is held;
            // keep it so the next exchange can use it.
            None => {
                *guard = Some(TokenPair::new(String::new()).with_refresh_token(refresh_token));
            }
        }
        debug!("refresh token updated");
    }

    async fn is_authenticated(&self) -> bool {
        let guard = self.tokens.read().await;
        guard.as_ref().is_some_and(|pair| !pair.access_token.is_empty() && !pair.is_expired(0))
    }

    async fn clear_all(&self) {
        *self.tokens.write().await = None;
        info!("credentials cleared");
    }
}
