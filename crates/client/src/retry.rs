//! Retry dispatch policy
//!
//! Pure decision logic for failed attempts: surface the error, recover
//! the credential, or back off and resubmit. The dispatch loop in
//! [`Client`](crate::client::Client) executes the chosen step; keeping
//! the choice side-effect free makes the dispatch rules testable in
//! isolation.

use std::time::Duration;

use crate::context::RequestContext;
use crate::error::{ApiError, ErrorCategory};

/// Next step for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Surface the error to the caller unchanged
    Propagate,

    /// Run (or join) a credential refresh, then resubmit once
    Refresh,

    /// Wait the given delay, then resubmit with an incremented retry count
    BackoffRetry(Duration),
}

/// Decision policy for failed attempts
///
/// Dispatch rules, in order:
/// 1. Unauthorized always refreshes when a refresher is configured, even
///    at the retry cap and even when the caller disabled retries.
///    Credential expiry is not a transport failure and is not charged to
///    the retry budget.
/// 2. `disable_retry`, non-retryable classifications, and an exhausted
///    budget propagate.
/// 3. Remaining transient failures back off linearly:
///    `delay = base * (retry_count + 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    refresh_available: bool,
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `refresh_available` reflects whether the client was built with a
    /// refresher; without one, Unauthorized propagates (resubmitting with
    /// the same rejected credential cannot succeed).
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, refresh_available: bool) -> Self {
        Self { max_retries, base_delay, refresh_available }
    }

    /// Decide the next step for a failed attempt
    #[must_use]
    pub fn decide(&self, ctx: &RequestContext, error: &ApiError) -> RetryStep {
        if error.category() == ErrorCategory::Unauthorized {
            if self.refresh_available {
                return RetryStep::Refresh;
            }
            return RetryStep::Propagate;
        }

        if ctx.disable_retry || !error.is_retryable() || ctx.retry_count() >= self.max_retries {
            return RetryStep::Propagate;
        }

        RetryStep::BackoffRetry(self.backoff_delay(ctx.retry_count()))
    }

    /// Delay before the next retry, linear in the attempt number
    ///
    /// `retry_count` is the number of retries already performed, so the
    /// first retry waits one base delay, the second two, and so on.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(retry_count.saturating_add(1))
    }
}
