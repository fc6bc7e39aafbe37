//! Request description and response types
//!
//! A [`RequestContext`] describes one logical API call: transport fields
//! (method, path, headers, query, body) plus the per-attempt metadata the
//! dispatch loop maintains (retry count, auth/retry opt-outs, cancellation).
//! The context is cloned with an incremented retry count for every
//! resubmission; the logical call keeps one `request_id` across attempts
//! so log lines correlate.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One logical HTTP call plus its attempt metadata
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method
    pub method: Method,

    /// Path relative to the client base URL (leading slash optional)
    pub path: String,

    /// Request headers (names case-insensitive, last write wins)
    pub headers: HeaderMap,

    /// Query parameters, appended in insertion order
    pub query: Vec<(String, String)>,

    /// Raw request body
    pub body: Option<Vec<u8>>,

    /// Bypass credential injection for this request
    pub skip_auth: bool,

    /// Surface the first failure instead of retrying transient errors
    pub disable_retry: bool,

    /// Cooperative cancellation signal honored by the executor, backoff
    /// waits, and the refresh queue
    pub cancellation: Option<CancellationToken>,

    /// Correlation id shared by every attempt of this logical call
    pub request_id: Uuid,

    /// Completed retry attempts; maintained by the dispatch loop
    pub(crate) retry_count: u32,
}

impl RequestContext {
    /// Create a context for `method` on `path` with empty metadata
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            skip_auth: false,
            disable_retry: false,
            cancellation: None,
            request_id: Uuid::new_v4(),
            retry_count: 0,
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing any previous value for the same name
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a JSON body and the matching content type
    ///
    /// # Errors
    /// Returns the serialization error when `body` cannot be encoded.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Set a raw body; the caller sets the content type header
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Bypass credential injection (login, refresh, password reset calls)
    #[must_use]
    pub fn with_skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Surface the first transient failure instead of retrying
    #[must_use]
    pub fn with_disable_retry(mut self) -> Self {
        self.disable_retry = true;
        self
    }

    /// Attach a cancellation signal
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Completed retry attempts for this logical call
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether the attached cancellation signal has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Clone this context for the next attempt
    pub(crate) fn clone_for_retry(&self) -> Self {
        let mut next = self.clone();
        next.retry_count = self.retry_count + 1;
        next
    }
}

/// Response surfaced by a request executor
///
/// Carries the status, headers, and raw body bytes. Body decoding and
/// model deserialization belong to the caller.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// Assemble a response from its transport parts
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    /// HTTP status code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning the body bytes
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8, lossily
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
