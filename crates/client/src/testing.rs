//! Test support
//!
//! Deterministic doubles for the transport and refresh seams plus a
//! polling helper for concurrency assertions. Available to this crate's
//! unit tests and, behind the `test-utils` feature, to downstream code.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lumara_auth::{RefreshError, TokenPair, TokenRefresher};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::context::{RequestContext, Response};
use crate::error::TransportError;
use crate::executor::RequestExecutor;

/// One request observed by [`MockExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    /// Request path as carried by the context
    pub path: String,
    /// `Authorization` header value, when one was present
    pub authorization: Option<String>,
    /// Retry count the attempt was sent with
    pub retry_count: u32,
}

/// Scripted transport double
///
/// Answers one scripted step per call; an exhausted script answers 200
/// with an empty body. Every call is recorded in arrival order.
#[derive(Debug)]
pub struct MockExecutor {
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    requests: Mutex<Vec<SentRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockExecutor {
    /// An executor with no script: every call answers 200
    #[must_use]
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// An executor that answers the given steps in order
    #[must_use]
    pub fn scripted(steps: Vec<Result<Response, TransportError>>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Hold every call open for `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls observed so far
    ///
    /// Incremented when a call arrives, before any configured delay.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Observed requests in arrival order
    #[must_use]
    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn send(&self, ctx: &RequestContext) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(SentRequest {
            path: ctx.path.clone(),
            authorization: ctx
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(String::from),
            retry_count: ctx.retry_count(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.lock().pop_front() {
            Some(step) => step,
            None => Ok(ok_response()),
        }
    }
}

/// Refresh double that parks until released
///
/// Each call counts itself, then waits for a gate permit, then answers
/// with a clone of the configured result. Tests release the gate once the
/// expected callers are parked, which makes single-flight assertions
/// deterministic.
#[derive(Debug)]
pub struct GatedRefresher {
    calls: AtomicUsize,
    gate: Semaphore,
    result: Result<TokenPair, RefreshError>,
}

impl GatedRefresher {
    /// A gated refresher answering `result` once released
    #[must_use]
    pub fn new(result: Result<TokenPair, RefreshError>) -> Self {
        Self { calls: AtomicUsize::new(0), gate: Semaphore::new(0), result }
    }

    /// Allow `n` parked refresh calls to complete
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Number of refresh calls observed so far
    ///
    /// Incremented when a call arrives, before it parks on the gate.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for GatedRefresher {
    async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.expect("refresh gate closed").forget();
        self.result.clone()
    }
}

/// Refresh double that answers immediately
#[derive(Debug)]
pub struct CountingRefresher {
    calls: AtomicUsize,
    result: Result<TokenPair, RefreshError>,
}

impl CountingRefresher {
    /// A refresher answering `result` on every call
    #[must_use]
    pub fn new(result: Result<TokenPair, RefreshError>) -> Self {
        Self { calls: AtomicUsize::new(0), result }
    }

    /// Number of refresh calls observed so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// An empty 200 response
#[must_use]
pub fn ok_response() -> Response {
    Response::new(StatusCode::OK, HeaderMap::new(), Vec::new())
}

/// Poll `condition` every few milliseconds until it holds
///
/// Panics with `description` after two seconds, so a stuck test names the
/// condition it was waiting for.
pub async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting until {description}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
