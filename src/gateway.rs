//! Request gateway — every outbound API call goes through here.
//!
//! The gateway:
//! 1. Attaches `Authorization: Bearer <credential>` when one is held
//! 2. Sends the request
//! 3. On a 401, coordinates a single-flight refresh and replays the request
//!    exactly once with the new credential
//! 4. Classifies everything else into the [`ClientError`] taxonomy
//!
//! A second 401 after replay is terminal for that call. Non-authorization
//! failures (network, 5xx, validation) pass through untouched — retry
//! policy for those belongs to the caller, not the gateway.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{Credential, RefreshCoordinator, TokenStore};
use crate::errors::ClientError;

/// A replayable description of an outbound request. The gateway rebuilds
/// the wire request from this on replay, so bodies must be owned values,
/// not streams.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

pub struct RequestGateway {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl RequestGateway {
    pub fn new(
        client: reqwest::Client,
        base_url: Url,
        tokens: Arc<TokenStore>,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            client,
            base_url,
            tokens,
            refresh,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a request, absorbing credential expiry. The caller sees a 401
    /// only if the replay after a successful refresh is rejected again.
    pub async fn send(&self, req: &RequestDescriptor) -> Result<Response, ClientError> {
        let resp = self.execute(req, self.tokens.get().as_ref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return classify(resp).await;
        }

        tracing::debug!(method = %req.method, path = %req.path, "401 from API; coordinating refresh");
        let credential = self.refresh.ensure_fresh_credential().await?;

        let resp = self.execute(req, Some(&credential)).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %req.method, path = %req.path, "replay rejected after refresh");
            return Err(ClientError::AuthExpired);
        }
        classify(resp).await
    }

    /// `send` plus JSON decoding of the response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        req: &RequestDescriptor,
    ) -> Result<T, ClientError> {
        let resp = self.send(req).await?;
        resp.json::<T>().await.map_err(ClientError::Transport)
    }

    async fn execute(
        &self,
        req: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> Result<Response, ClientError> {
        let url = self
            .base_url
            .join(req.path.trim_start_matches('/'))
            .map_err(|e| ClientError::Validation {
                status: 0,
                message: format!("invalid request path {:?}: {}", req.path, e),
            })?;

        let mut builder = self.client.request(req.method.clone(), url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        if let Some(cred) = credential {
            builder = builder.bearer_auth(cred.as_str());
        }
        builder.send().await.map_err(ClientError::Transport)
    }
}

/// Maps a settled response onto the error taxonomy. 401 never reaches here
/// — the gateway handles it before classifying.
async fn classify(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        400 | 422 => Err(ClientError::Validation {
            status: status.as_u16(),
            message: body,
        }),
        _ => Err(ClientError::Upstream {
            status: status.as_u16(),
            body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builders() {
        let req = RequestDescriptor::get("/logs").with_query("limit", 50);
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query, vec![("limit".to_string(), "50".to_string())]);
        assert!(req.body.is_none());

        let req = RequestDescriptor::post("/auth/login")
            .with_body(serde_json::json!({ "email": "op@example.com" }));
        assert!(req.body.is_some());
    }
}
