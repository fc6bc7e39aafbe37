//! # Lumara Client
//!
//! Resilient HTTP client for the Lumara API: credential injection, typed
//! failure classification, linear-backoff retries, and single-flight
//! token refresh with FIFO replay of requests suspended during the
//! refresh.
//!
//! ## Architecture
//!
//! - [`client`]: the [`Client`] facade and its dispatch loop
//! - [`config`]: client configuration and validation
//! - [`context`]: per-request description and response types
//! - [`error`]: transport errors and their classified API form
//! - [`executor`]: the transport seam and its reqwest-backed default
//! - [`injector`]: `Authorization` header injection with skip rules
//! - [`retry`]: retry dispatch and the linear backoff schedule
//!
//! Every request flows injector → executor, and on failure through the
//! retry policy, which either surfaces the classified error, backs off
//! and retries, or routes a 401 through the refresh coordinator.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod injector;
mod refresh;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use context::{RequestContext, Response};
pub use error::{ApiError, ErrorCategory, TransportError};
pub use executor::{HttpExecutor, RequestExecutor};
pub use injector::CredentialInjector;
pub use retry::{RetryPolicy, RetryStep};

pub use lumara_auth::{
    CredentialStore, MemoryCredentialStore, RefreshError, TokenPair, TokenRefresher,
};
