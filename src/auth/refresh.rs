//! Credential refresh coordination — single-flight with a FIFO waiter queue.
//!
//! The flow:
//! 1. A call observes a 401 and asks the coordinator for a fresh credential.
//! 2. If no refresh is in flight, the coordinator starts exactly one and the
//!    caller becomes the first waiter.
//! 3. Callers that arrive while the refresh is in flight join the waiter
//!    queue; no second refresh is issued.
//! 4. On success every waiter is resumed, in the order it arrived, with the
//!    same new credential. On failure every waiter is rejected with the same
//!    error, the store is cleared, and the supervisor forces a logout.
//!
//! Failure is sticky: once a refresh has failed, further calls short-circuit
//! with `SessionEnded` until an explicit login resets the coordinator. The
//! refresh itself runs on a spawned task, so tearing down the view that
//! triggered it never cancels a refresh other callers are parked on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use crate::auth::token::{Credential, TokenStore};
use crate::auth::{AuthPayload, SessionSupervisor};
use crate::errors::RefreshError;

/// Transport seam for the refresh endpoint. The HTTP implementation posts
/// with no body — the refresh token rides in an http-only cookie.
#[async_trait]
pub trait RefreshBackend: Send + Sync {
    async fn refresh(&self) -> Result<AuthPayload, RefreshError>;
}

/// `POST /auth/refresh` against the real API.
pub struct HttpRefreshBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRefreshBackend {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl RefreshBackend for HttpRefreshBackend {
    async fn refresh(&self) -> Result<AuthPayload, RefreshError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected(status.as_u16()));
        }
        resp.json::<AuthPayload>()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshState {
    Idle,
    InFlight,
    Failed,
}

type Waiter = oneshot::Sender<Result<Credential, RefreshError>>;

struct CoordinatorInner {
    state: RefreshState,
    waiters: VecDeque<Waiter>,
}

/// Session-scoped refresh coordinator. One instance per session, shared via
/// `Arc` with every gateway that needs it; the refresh state lives here and
/// nowhere else.
pub struct RefreshCoordinator {
    inner: Mutex<CoordinatorInner>,
    backend: Box<dyn RefreshBackend>,
    tokens: Arc<TokenStore>,
    session: Arc<SessionSupervisor>,
}

impl RefreshCoordinator {
    pub fn new(
        backend: Box<dyn RefreshBackend>,
        tokens: Arc<TokenStore>,
        session: Arc<SessionSupervisor>,
    ) -> Self {
        Self {
            inner: Mutex::new(CoordinatorInner {
                state: RefreshState::Idle,
                waiters: VecDeque::new(),
            }),
            backend,
            tokens,
            session,
        }
    }

    /// Obtains a fresh credential, coalescing concurrent callers onto a
    /// single refresh call. Idempotent under concurrency: however many
    /// callers race in, the backend is hit once and all of them settle with
    /// that one outcome, in arrival order.
    pub async fn ensure_fresh_credential(
        self: &Arc<Self>,
    ) -> Result<Credential, RefreshError> {
        let rx = {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                RefreshState::Failed => return Err(RefreshError::SessionEnded),
                RefreshState::InFlight => {
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(tx);
                    tracing::debug!(
                        queued = inner.waiters.len(),
                        "refresh in flight; joining waiter queue"
                    );
                    rx
                }
                RefreshState::Idle => {
                    inner.state = RefreshState::InFlight;
                    let (tx, rx) = oneshot::channel();
                    inner.waiters.push_back(tx);
                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.drive_refresh().await });
                    rx
                }
            }
        };

        // The coordinator outlives any single view, so a dropped sender can
        // only mean the whole session went away mid-flight.
        rx.await.unwrap_or(Err(RefreshError::SessionEnded))
    }

    /// Re-arms a failed coordinator after an explicit login.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == RefreshState::Failed {
            inner.state = RefreshState::Idle;
        }
    }

    async fn drive_refresh(&self) {
        tracing::debug!("issuing credential refresh");
        match self.backend.refresh().await {
            Ok(payload) => {
                let credential = Credential::new(payload.access_token);
                self.tokens.set(credential.clone());

                let waiters = {
                    let mut inner = self.inner.lock().unwrap();
                    inner.state = RefreshState::Idle;
                    std::mem::take(&mut inner.waiters)
                };
                tracing::info!(resumed = waiters.len(), "credential refresh succeeded");
                for tx in waiters {
                    let _ = tx.send(Ok(credential.clone()));
                }
            }
            Err(err) => {
                let waiters = {
                    let mut inner = self.inner.lock().unwrap();
                    inner.state = RefreshState::Failed;
                    std::mem::take(&mut inner.waiters)
                };
                tracing::error!(rejected = waiters.len(), "credential refresh failed: {}", err);
                for tx in waiters {
                    let _ = tx.send(Err(err.clone()));
                }
                self.session
                    .force_logout(&format!("credential refresh failed: {}", err));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.inner.lock().unwrap().waiters.len()
    }
}
