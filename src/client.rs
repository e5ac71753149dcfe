//! Client facade — wires the session-scoped pieces together.
//!
//! One `OpslinkClient` per session owns the shared singletons (token store,
//! refresh coordinator, session supervisor) and hands out view-scoped feed
//! runtimes. The underlying `reqwest::Client` keeps a cookie store so the
//! http-only refresh cookie set at login rides along on refresh calls.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use url::Url;

use crate::auth::{
    AuthPayload, FileCredentialCache, HttpRefreshBackend, RefreshCoordinator, SessionState,
    SessionSupervisor, TokenStore, User,
};
use crate::config::Config;
use crate::errors::ClientError;
use crate::feed::FeedRuntime;
use crate::gateway::{RequestDescriptor, RequestGateway};

pub struct OpslinkClient {
    http: reqwest::Client,
    api_url: Url,
    ws_url: Url,
    gateway: Arc<RequestGateway>,
    tokens: Arc<TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    session: Arc<SessionSupervisor>,
    config: Config,
}

impl OpslinkClient {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let api_url = normalize_base(&config.api_url).context("invalid OPSLINK_API_URL")?;
        let ws_url = normalize_base(&config.ws_url).context("invalid OPSLINK_WS_URL")?;

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("building http client")?;

        let tokens = Arc::new(TokenStore::new(Box::new(FileCredentialCache::new(
            config.credentials_file.clone(),
        ))));
        let session = Arc::new(SessionSupervisor::new(Arc::clone(&tokens)));
        let refresh_endpoint = api_url.join("auth/refresh")?;
        let refresh = Arc::new(RefreshCoordinator::new(
            Box::new(HttpRefreshBackend::new(http.clone(), refresh_endpoint)),
            Arc::clone(&tokens),
            Arc::clone(&session),
        ));
        let gateway = Arc::new(RequestGateway::new(
            http.clone(),
            api_url.clone(),
            Arc::clone(&tokens),
            Arc::clone(&refresh),
        ));

        Ok(Self {
            http,
            api_url,
            ws_url,
            gateway,
            tokens,
            refresh,
            session,
            config,
        })
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<SessionSupervisor> {
        &self.session
    }

    /// Authenticates and installs the new credential. Bypasses the gateway:
    /// a 401 here means bad credentials, not an expired token, and must not
    /// trigger the refresh flow.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let url = self
            .api_url
            .join("auth/login")
            .map_err(|e| ClientError::Validation {
                status: 0,
                message: e.to_string(),
            })?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Validation {
                status: status.as_u16(),
                message,
            });
        }

        let payload: AuthPayload = resp.json().await.map_err(ClientError::Transport)?;
        self.tokens
            .set(crate::auth::Credential::new(payload.access_token));
        self.refresh.reset();
        self.session.mark_authenticated();
        tracing::info!(email = %payload.user.email, "logged in");
        Ok(payload.user)
    }

    /// Invalidates the server-side session (best effort), then enters the
    /// local unauthenticated state.
    pub async fn logout(&self) {
        if let Err(e) = self
            .gateway
            .send(&RequestDescriptor::post("auth/logout"))
            .await
        {
            tracing::warn!("server logout failed: {}", e);
        }
        self.session.force_logout("logged out");
    }

    /// Starts a view-scoped feed: live channel plus one-shot bootstrap.
    pub async fn start_feed(&self) -> (FeedRuntime, mpsc::UnboundedReceiver<ClientError>) {
        // Url::join never fails here: the base is normalized with a
        // trailing slash and the segment is static.
        let stream_url = self
            .ws_url
            .join("logs/stream")
            .unwrap_or_else(|_| self.ws_url.clone());
        FeedRuntime::start(
            Arc::clone(&self.gateway),
            &stream_url,
            self.tokens.get().as_ref(),
            self.config.feed_capacity,
            self.config.bootstrap_limit,
        )
        .await
    }

    /// Operator clear-history: destructive clear on the remote store first,
    /// then the local buffer (when a feed is mounted).
    pub async fn clear_history(
        &self,
        feed: Option<&crate::feed::FeedSession>,
    ) -> Result<(), ClientError> {
        self.gateway.send(&RequestDescriptor::delete("logs")).await?;
        if let Some(session) = feed {
            session.clear();
        }
        tracing::info!("log history cleared");
        Ok(())
    }

    pub fn session_state(&self) -> SessionState {
        self.session.subscribe().borrow().clone()
    }
}

/// Parses a base URL and guarantees a trailing slash so `Url::join` treats
/// the last path segment as a directory.
fn normalize_base(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url)
}
