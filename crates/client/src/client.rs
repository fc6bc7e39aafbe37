//! API client facade
//!
//! [`Client`] owns the dispatch loop that every request flows through:
//! inject credentials, execute, classify the failure, then either
//! surface it, back off and retry, or route it through the single-flight
//! token refresh. Construction goes through [`ClientBuilder`], which
//! validates configuration and wires the default transport.

use std::sync::Arc;

use lumara_auth::{CredentialStore, MemoryCredentialStore, TokenRefresher};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ConfigError};
use crate::context::{RequestContext, Response};
use crate::error::ApiError;
use crate::executor::{HttpExecutor, RequestExecutor};
use crate::injector::CredentialInjector;
use crate::refresh::RefreshCoordinator;
use crate::retry::{RetryPolicy, RetryStep};

/// Resilient API client
///
/// Each request is prepared by the credential injector, executed, and on
/// failure classified into a typed error. Transient failures back off
/// linearly and retry up to the configured budget; a 401 is routed
/// through the refresh coordinator, which runs at most one token
/// exchange at a time and replays suspended requests in arrival order.
pub struct Client {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    injector: CredentialInjector,
    executor: Arc<dyn RequestExecutor>,
    policy: RetryPolicy,
    refresh: Option<RefreshCoordinator>,
}

impl Client {
    /// Start building a client for `config`
    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder { config, store: None, refresher: None, executor: None }
    }

    /// Execute one logical call through the full dispatch loop
    ///
    /// Resolves with the response or the terminal [`ApiError`] once the
    /// request succeeded, exhausted its retry budget, failed with a
    /// non-retryable classification, or was cancelled.
    ///
    /// # Errors
    /// Returns the classified error for the final attempt; transient
    /// variants carry the number of retries performed.
    pub async fn send(&self, ctx: RequestContext) -> Result<Response, ApiError> {
        let mut ctx = ctx;
        loop {
            if ctx.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            ctx = self.injector.prepare(ctx).await;
            let transport = match self.executor.send(&ctx).await {
                Ok(response) => return Ok(response),
                Err(transport) => transport,
            };

            let error = ApiError::from(transport);
            match self.policy.decide(&ctx, &error) {
                RetryStep::Propagate => {
                    let error = error.with_retries(ctx.retry_count());
                    debug!(request_id = %ctx.request_id, error = %error, "surfacing failure");
                    return Err(error);
                }
                RetryStep::Refresh => {
                    debug!(
                        request_id = %ctx.request_id,
                        "routing unauthorized response through token refresh"
                    );
                    return match &self.refresh {
                        Some(coordinator) => coordinator.handle_unauthorized(ctx).await,
                        None => Err(error.with_retries(ctx.retry_count())),
                    };
                }
                RetryStep::BackoffRetry(delay) => {
                    warn!(
                        request_id = %ctx.request_id,
                        error = %error,
                        retry_count = ctx.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        "transient failure; backing off before retry"
                    );
                    if let Some(token) = &ctx.cancellation {
                        tokio::select! {
                            () = token.cancelled() => return Err(ApiError::Cancelled),
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                    ctx = ctx.clone_for_retry();
                }
            }
        }
    }

    /// `GET` the given path
    ///
    /// # Errors
    /// Returns the classified error for the final attempt.
    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(RequestContext::new(Method::GET, path)).await
    }

    /// `POST` a JSON body to the given path
    ///
    /// # Errors
    /// Returns the classified error for the final attempt, or `Unknown`
    /// when the body cannot be encoded.
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, ApiError> {
        let ctx = RequestContext::new(Method::POST, path)
            .with_json(body)
            .map_err(encoding_error)?;
        self.send(ctx).await
    }

    /// `PUT` a JSON body to the given path
    ///
    /// # Errors
    /// Returns the classified error for the final attempt, or `Unknown`
    /// when the body cannot be encoded.
    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, ApiError> {
        let ctx =
            RequestContext::new(Method::PUT, path).with_json(body).map_err(encoding_error)?;
        self.send(ctx).await
    }

    /// `DELETE` the given path
    ///
    /// # Errors
    /// Returns the classified error for the final attempt.
    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.send(RequestContext::new(Method::DELETE, path)).await
    }

    /// Whether the store currently holds a usable credential
    pub async fn is_authenticated(&self) -> bool {
        self.store.is_authenticated().await
    }

    /// The credential store backing this client
    #[must_use]
    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
impl Client {
    fn refresh_queue_depth(&self) -> usize {
        self.refresh.as_ref().map_or(0, |coordinator| coordinator.queued_waiters())
    }
}

fn encoding_error(err: serde_json::Error) -> ApiError {
    ApiError::Unknown { message: format!("request body encoding failed: {err}"), status: None }
}

/// Builder for [`Client`]
///
/// The credential store defaults to an in-memory store and the executor
/// to the reqwest-backed transport. Without a refresher, a 401 surfaces
/// as `Unauthorized` instead of triggering a refresh.
pub struct ClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    executor: Option<Arc<dyn RequestExecutor>>,
}

impl ClientBuilder {
    /// Use the given credential store
    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use the given refresher for recovering from 401 responses
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Use the given transport instead of the reqwest-backed default
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Validate the configuration and assemble the client
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the configuration is invalid or the
    /// default transport cannot be constructed.
    pub fn build(self) -> Result<Client, ConfigError> {
        self.config.validate()?;

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpExecutor::new(&self.config)?),
        };
        let injector =
            CredentialInjector::new(store.clone(), self.config.auth_skip_paths.clone());
        let policy = RetryPolicy::new(
            self.config.max_retries,
            self.config.base_backoff_delay,
            self.refresher.is_some(),
        );
        let refresh = self.refresher.map(|refresher| {
            RefreshCoordinator::new(
                store.clone(),
                refresher,
                injector.clone(),
                executor.clone(),
                self.config.request_timeout,
            )
        });

        Ok(Client { config: self.config, store, injector, executor, policy, refresh })
    }
}
