//! Single-flight token refresh
//!
//! One refresh services every concurrent `Unauthorized`. The first request
//! to observe a 401 flips the coordinator to `Refreshing`, takes the front
//! of the queue, and starts the exchange on a detached task; requests that
//! observe a 401 while the refresh is outstanding park behind it instead
//! of triggering a second exchange. On success the task persists the new
//! tokens and drains the queue in arrival order, the triggering request
//! first; on failure every parked request receives the refresh failure.
//! The cycle belongs to the task, not to any caller: dropping or
//! cancelling the request that started it never stalls the queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use lumara_auth::{CredentialStore, RefreshError, TokenRefresher};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{RequestContext, Response};
use crate::error::ApiError;
use crate::executor::RequestExecutor;
use crate::injector::CredentialInjector;

/// Coordinator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshState {
    /// No refresh in progress
    Idle,
    /// A detached task is exchanging the token or draining the queue
    Refreshing,
}

/// A request suspended while a refresh is outstanding
struct Waiter {
    id: u64,
    ctx: RequestContext,
    tx: oneshot::Sender<Result<Response, ApiError>>,
}

struct Inner {
    state: RefreshState,
    queue: VecDeque<Waiter>,
    next_waiter_id: u64,
}

/// Serializes token refreshes across concurrent requests
///
/// State and queue live behind one lock so that checking the state and
/// enqueueing happen atomically: a request can never observe `Refreshing`
/// and then enqueue after the drain has finished. The lock is held only
/// for short synchronous sections, never across an await.
///
/// The exchange itself runs on a task of its own; every caller, the one
/// that started the cycle included, parks on a resolution handle. A
/// caller future that is dropped mid-cycle therefore leaves the cycle
/// untouched: the task still settles the exchange, drains the queue, and
/// returns the coordinator to idle.
///
/// Clones share the same state.
#[derive(Clone)]
pub(crate) struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    injector: CredentialInjector,
    executor: Arc<dyn RequestExecutor>,
    refresh_timeout: Duration,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        injector: CredentialInjector,
        executor: Arc<dyn RequestExecutor>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RefreshState::Idle,
                queue: VecDeque::new(),
                next_waiter_id: 0,
            })),
            store,
            refresher,
            injector,
            executor,
            refresh_timeout,
        }
    }

    /// Route a request that failed with `Unauthorized`
    ///
    /// Every caller enqueues and parks on its resolution handle. The first
    /// caller to arrive while the coordinator is idle additionally starts
    /// the refresh cycle on a detached task; the queue is empty at that
    /// moment, so its request sits at the front and is resubmitted before
    /// any other. A caller whose cancellation fires while parked resolves
    /// with `Cancelled` and leaves the queue; the cycle keeps running,
    /// because the remaining waiters depend on the exchange completing.
    pub(crate) async fn handle_unauthorized(
        &self,
        ctx: RequestContext,
    ) -> Result<Response, ApiError> {
        let request_id = ctx.request_id;
        let cancellation = ctx.cancellation.clone();
        let (tx, rx) = oneshot::channel();

        let (id, starts_cycle) = {
            let mut inner = self.inner.lock();
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            let starts_cycle = inner.state == RefreshState::Idle;
            if starts_cycle {
                inner.state = RefreshState::Refreshing;
            } else {
                debug!(
                    request_id = %ctx.request_id,
                    queue_depth = inner.queue.len() + 1,
                    "suspending request while a token refresh is outstanding"
                );
            }
            inner.queue.push_back(Waiter { id, ctx, tx });
            (id, starts_cycle)
        };

        if starts_cycle {
            let cycle = self.clone();
            tokio::spawn(async move { cycle.run_refresh(request_id).await });
        }

        self.wait_queued(id, rx, cancellation).await
    }

    /// Exchange once, persist, drain; detached from every caller
    async fn run_refresh(&self, request_id: Uuid) {
        info!(%request_id, "starting token refresh");

        let refreshed =
            match tokio::time::timeout(self.refresh_timeout, self.refresher.refresh()).await {
                Ok(result) => result,
                Err(_) => Err(RefreshError::Transport("token refresh timed out".into())),
            };

        match refreshed {
            Ok(tokens) => {
                self.store.save_access_token(&tokens.access_token).await;
                if let Some(refresh_token) = &tokens.refresh_token {
                    self.store.save_refresh_token(refresh_token).await;
                }
                info!(%request_id, "token refresh succeeded");
                self.drain_queue().await;
            }
            Err(err) => {
                warn!(%request_id, error = %err, "token refresh failed");
                let failure =
                    ApiError::Unauthorized { message: format!("token refresh failed: {err}") };
                self.reject_queue(&failure);
            }
        }
    }

    /// Park on the resolution handle, honoring cancellation
    async fn wait_queued(
        &self,
        id: u64,
        rx: oneshot::Receiver<Result<Response, ApiError>>,
        cancellation: Option<CancellationToken>,
    ) -> Result<Response, ApiError> {
        match cancellation {
            Some(token) => tokio::select! {
                () = token.cancelled() => {
                    self.remove_waiter(id);
                    Err(ApiError::Cancelled)
                }
                outcome = rx => resolve_waiter_outcome(outcome),
            },
            None => resolve_waiter_outcome(rx.await),
        }
    }

    /// Resubmit one request with freshly injected credentials
    ///
    /// Single pass: the outcome, success or classified failure, resolves
    /// the caller directly and never re-enters retry dispatch, so a token
    /// that is rejected again cannot start a refresh loop.
    async fn resubmit(&self, ctx: RequestContext) -> Result<Response, ApiError> {
        if ctx.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let prepared = self.injector.prepare(ctx).await;
        debug!(
            request_id = %prepared.request_id,
            path = %prepared.path,
            "resubmitting request after refresh"
        );
        self.executor.send(&prepared).await.map_err(ApiError::from)
    }

    /// Resolve every queued waiter in arrival order, then go idle
    ///
    /// Each waiter is resubmitted outside the lock and resolved
    /// independently; one waiter's failure never blocks the next. A waiter
    /// whose receiver is gone, because its caller was dropped, is skipped
    /// without a resubmission. The transition to idle happens under the
    /// same lock acquisition that observes the empty queue, so a request
    /// that enqueued during the drain is always popped before the
    /// coordinator goes idle.
    async fn drain_queue(&self) {
        loop {
            let waiter = {
                let mut inner = self.inner.lock();
                match inner.queue.pop_front() {
                    Some(waiter) => waiter,
                    None => {
                        inner.state = RefreshState::Idle;
                        debug!("refresh queue drained");
                        break;
                    }
                }
            };

            if waiter.tx.is_closed() {
                debug!(
                    request_id = %waiter.ctx.request_id,
                    "dropping abandoned request from refresh queue"
                );
                continue;
            }

            if waiter.ctx.is_cancelled() {
                debug!(
                    request_id = %waiter.ctx.request_id,
                    "dropping cancelled request from refresh queue"
                );
                let _ = waiter.tx.send(Err(ApiError::Cancelled));
                continue;
            }

            let outcome = self.resubmit(waiter.ctx).await;
            // The receiver may have cancelled while the resubmission ran.
            let _ = waiter.tx.send(outcome);
        }
    }

    /// Reject every queued waiter with the refresh failure, then go idle
    fn reject_queue(&self, failure: &ApiError) {
        loop {
            let waiter = {
                let mut inner = self.inner.lock();
                match inner.queue.pop_front() {
                    Some(waiter) => waiter,
                    None => {
                        inner.state = RefreshState::Idle;
                        break;
                    }
                }
            };

            let error = if waiter.ctx.is_cancelled() {
                ApiError::Cancelled
            } else {
                failure.clone()
            };
            let _ = waiter.tx.send(Err(error));
        }
    }

    fn remove_waiter(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.queue.retain(|waiter| waiter.id != id);
    }
}

#[cfg(test)]
impl RefreshCoordinator {
    pub(crate) fn queued_waiters(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub(crate) fn state(&self) -> RefreshState {
        self.inner.lock().state
    }
}

fn resolve_waiter_outcome(
    outcome: Result<Result<Response, ApiError>, oneshot::error::RecvError>,
) -> Result<Response, ApiError> {
    match outcome {
        Ok(result) => result,
        Err(_) => Err(ApiError::Unknown {
            message: "token refresh was interrupted before this request was resubmitted".into(),
            status: None,
        }),
    }
}
