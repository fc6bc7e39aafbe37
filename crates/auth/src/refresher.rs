//! Refresh-token exchange seam
//!
//! The client invokes this trait when a request fails with an
//! authorization error. How the exchange happens (OAuth token endpoint,
//! first-party session API, test double) is the application's concern.

use async_trait::async_trait;

use crate::types::{RefreshError, TokenPair};

/// Zero-argument refresh-token exchange
///
/// The client guarantees this is never invoked concurrently with itself
/// on one client instance: a refresh cycle runs to completion before the
/// next can start. Implementations read their own refresh token (usually
/// from the same [`CredentialStore`](crate::store::CredentialStore) the
/// client writes to) and must not persist the result themselves: the
/// client writes the returned pair back through the store exactly once.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange the held refresh token for a fresh token pair
    ///
    /// # Errors
    /// Returns [`RefreshError`] when no refresh token is available, the
    /// server rejects the exchange, or the exchange cannot be completed.
    async fn refresh(&self) -> Result<TokenPair, RefreshError>;
}
