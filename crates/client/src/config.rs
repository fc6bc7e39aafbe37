//! Client configuration
//!
//! Recognized options, their defaults, and builder validation. Invalid
//! combinations are rejected at build time so the dispatch loop never
//! has to re-check them.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default transient retry budget per logical call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for linear backoff
pub const DEFAULT_BASE_BACKOFF_DELAY: Duration = Duration::from_millis(500);

/// Default per-attempt timeout, also applied to the refresh operation
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound accepted for `max_retries`
const MAX_RETRIES_CEILING: u32 = 10;

/// Error type for configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The base URL is missing or unparseable
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// A numeric or duration option is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the resilient client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against
    pub base_url: String,

    /// Transient retry budget per logical call (authorization recovery is
    /// not charged against it)
    pub max_retries: u32,

    /// Base delay for the linear backoff between transient retries
    pub base_backoff_delay: Duration,

    /// Timeout for each attempt and for the refresh operation
    pub request_timeout: Duration,

    /// Paths that never receive an Authorization header (login, refresh,
    /// password reset). Entries match exactly or as `/`-boundary prefixes;
    /// trailing slashes on an entry are ignored.
    pub auth_skip_paths: Vec<String>,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_delay: DEFAULT_BASE_BACKOFF_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auth_skip_paths: Vec::new(),
        }
    }

    /// Create a configuration builder
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the base URL does not parse, the
    /// timeout is zero, or the retry budget exceeds the supported ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.max_retries > MAX_RETRIES_CEILING {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be at most {MAX_RETRIES_CEILING}"
            )));
        }

        Ok(())
    }
}

/// Builder for `ClientConfig` with fluent API
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Start from defaults for the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { config: ClientConfig::new(base_url) }
    }

    /// Set the transient retry budget
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the linear backoff base delay
    #[must_use]
    pub fn base_backoff_delay(mut self, delay: Duration) -> Self {
        self.config.base_backoff_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Add one path to the credential-injection skip list
    #[must_use]
    pub fn auth_skip_path(mut self, path: impl Into<String>) -> Self {
        self.config.auth_skip_paths.push(path.into());
        self
    }

    /// Replace the credential-injection skip list
    #[must_use]
    pub fn auth_skip_paths(mut self, paths: Vec<String>) -> Self {
        self.config.auth_skip_paths = paths;
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError`] when validation fails; see
    /// [`ClientConfig::validate`].
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client configuration.
    use super::*;

    /// Validates `ClientConfig::new` behavior for the defaults scenario.
    ///
    /// Assertions:
    /// - Confirms `config.max_retries` equals `3`.
    /// - Confirms `config.base_backoff_delay` equals `500ms`.
    /// - Confirms `config.request_timeout` equals `30s`.
    /// - Ensures `config.auth_skip_paths.is_empty()` evaluates to true.
    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://api.lumara.app");

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_backoff_delay, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.auth_skip_paths.is_empty());
    }

    /// Validates `ClientConfigBuilder::build` behavior for the fluent
    /// override scenario.
    ///
    /// Assertions:
    /// - Confirms `config.max_retries` equals `2`.
    /// - Confirms `config.base_backoff_delay` equals `50ms`.
    /// - Confirms `config.auth_skip_paths` contains both entries in order.
    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder("https://api.lumara.app")
            .max_retries(2)
            .base_backoff_delay(Duration::from_millis(50))
            .request_timeout(Duration::from_secs(5))
            .auth_skip_path("/v1/auth/login")
            .auth_skip_path("/v1/auth/refresh")
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_backoff_delay, Duration::from_millis(50));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.auth_skip_paths,
            vec!["/v1/auth/login".to_string(), "/v1/auth/refresh".to_string()]
        );
    }

    /// Validates `ClientConfig::validate` behavior for the malformed base URL
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a relative URL is rejected with `ConfigError::InvalidBaseUrl`.
    #[test]
    fn test_invalid_base_url_rejected() {
        let result = ClientConfig::builder("not a url").build();

        assert!(matches!(result, Err(ConfigError::InvalidBaseUrl(_))));
    }

    /// Validates `ClientConfig::validate` behavior for the zero timeout
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a zero timeout is rejected with `ConfigError::Invalid`.
    #[test]
    fn test_zero_timeout_rejected() {
        let result = ClientConfig::builder("https://api.lumara.app")
            .request_timeout(Duration::ZERO)
            .build();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    /// Validates `ClientConfig::validate` behavior for the oversized retry
    /// budget scenario.
    ///
    /// Assertions:
    /// - Ensures `max_retries = 11` is rejected.
    /// - Ensures `max_retries = 0` (retries disabled) is accepted.
    #[test]
    fn test_retry_budget_bounds() {
        let too_large = ClientConfig::builder("https://api.lumara.app").max_retries(11).build();
        assert!(matches!(too_large, Err(ConfigError::Invalid(_))));

        let disabled = ClientConfig::builder("https://api.lumara.app").max_retries(0).build();
        assert!(disabled.is_ok());
    }
}
