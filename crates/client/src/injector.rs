//! Credential injection
//!
//! Attaches the Authorization header to outgoing requests unless the
//! request opts out or its path is on the configured skip list. Missing
//! credentials are not an error here: the request goes out bare and the
//! resulting 401 is handled by the dispatch loop like any other.

use std::sync::Arc;

use lumara_auth::CredentialStore;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use tracing::{debug, warn};

use crate::context::RequestContext;

/// Decides whether a request gets an Authorization header and attaches it
#[derive(Clone)]
pub struct CredentialInjector {
    store: Arc<dyn CredentialStore>,
    skip_paths: Vec<String>,
}

impl CredentialInjector {
    /// Create an injector reading from `store`
    ///
    /// `skip_paths` entries match a request path exactly or as a
    /// `/`-boundary prefix: `/v1/auth` skips `/v1/auth/login` but not
    /// `/v1/authors`. Trailing slashes on an entry are ignored, so
    /// `/v1/auth/` matches the same paths as `/v1/auth`.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, skip_paths: Vec<String>) -> Self {
        Self { store, skip_paths }
    }

    /// Return the context with the Authorization header attached, or
    /// unchanged when injection does not apply
    ///
    /// Never fails: an absent credential omits the header, and a stored
    /// value that is not a valid header is skipped with a warning.
    pub async fn prepare(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.skip_auth {
            debug!(request_id = %ctx.request_id, "credential injection skipped by request flag");
            return ctx;
        }

        if self.is_skip_path(&ctx.path) {
            debug!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                "credential injection skipped for allow-listed path"
            );
            return ctx;
        }

        let Some(header) = self.store.authorization_header().await else {
            debug!(
                request_id = %ctx.request_id,
                "no stored credential; sending without Authorization"
            );
            return ctx;
        };

        match HeaderValue::from_str(&header) {
            Ok(value) => {
                ctx.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                warn!(
                    request_id = %ctx.request_id,
                    "stored credential is not a valid header value; sending without Authorization"
                );
            }
        }

        ctx
    }

    fn is_skip_path(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|entry| !entry.is_empty() && Self::path_matches(entry, path))
    }

    fn path_matches(entry: &str, path: &str) -> bool {
        let entry = entry.trim_end_matches('/');
        if entry.is_empty() {
            // The entry was all slashes; only the root path itself matches.
            return path == "/";
        }
        path == entry || (path.starts_with(entry) && path[entry.len()..].starts_with('/'))
    }
}
