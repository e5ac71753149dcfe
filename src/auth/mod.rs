//! Credential lifecycle: storage, single-flight refresh, session supervision.

pub mod refresh;
pub mod session;
pub mod token;

pub use refresh::{HttpRefreshBackend, RefreshBackend, RefreshCoordinator};
pub use session::{SessionState, SessionSupervisor};
pub use token::{Credential, CredentialCache, FileCredentialCache, MemoryCredentialCache, TokenStore};

use serde::{Deserialize, Serialize};

/// Response body of the login and refresh endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    pub access_token: String,
}

/// The authenticated operator, as reported by the auth endpoints. Returned
/// to callers of `login`; the core stores only the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}
