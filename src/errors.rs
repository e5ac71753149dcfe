use thiserror::Error;

/// Error taxonomy for outbound calls and the live feed.
///
/// `AuthExpired` is normally absorbed by the gateway/refresh flow and only
/// surfaces when a replayed request is rejected a second time. `Refresh` is
/// fatal to the session: the supervisor has already forced a logout by the
/// time a caller sees it. Everything else propagates unchanged to the call
/// site — the core never retries on the caller's behalf.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authorization expired")]
    AuthExpired,

    #[error("credential refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("live channel error: {0}")]
    Channel(String),
}

/// Failure modes of the refresh endpoint itself.
///
/// Cloneable so one refresh outcome can be fanned out to every queued
/// pending call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("refresh rejected by server (status {0})")]
    Rejected(u16),

    #[error("refresh transport failure: {0}")]
    Transport(String),

    #[error("session already ended")]
    SessionEnded,
}
