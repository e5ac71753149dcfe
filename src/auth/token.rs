//! Access credential ownership.
//!
//! `TokenStore` is the single owner of the live credential for a session:
//! every outbound call reads it, and only the refresh coordinator and the
//! session supervisor may write it. The in-memory value is mirrored to a
//! durable `CredentialCache` under one well-known key so a restarted client
//! picks up where it left off. The refresh token is never stored here — the
//! server keeps it in an http-only cookie.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Storage key for the access credential in the durable mirror.
pub const ACCESS_TOKEN_KEY: &str = "opslink.access_token";

/// Opaque bearer token. The expiry is server-determined; the client never
/// parses or inspects the token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Durable mirror for the credential (the localStorage analogue).
///
/// Mirror failures are logged and swallowed: losing the mirror costs a
/// re-login after restart, never a broken session.
pub trait CredentialCache: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

/// File-backed cache: a small JSON object keyed by [`ACCESS_TOKEN_KEY`].
pub struct FileCredentialCache {
    path: PathBuf,
}

impl FileCredentialCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialCache for FileCredentialCache {
    fn load(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let map: HashMap<String, String> = serde_json::from_str(&raw).ok()?;
        map.get(ACCESS_TOKEN_KEY).cloned()
    }

    fn store(&self, token: &str) {
        let mut map = HashMap::new();
        map.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        let json = match serde_json::to_string(&map) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("credential mirror serialize failed: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!(path = %self.path.display(), "credential mirror write failed: {}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "credential mirror clear failed: {}", e);
            }
        }
    }
}

/// In-memory cache for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryCredentialCache {
    slot: RwLock<Option<String>>,
}

impl CredentialCache for MemoryCredentialCache {
    fn load(&self) -> Option<String> {
        self.slot.read().unwrap().clone()
    }

    fn store(&self, token: &str) {
        *self.slot.write().unwrap() = Some(token.to_string());
    }

    fn clear(&self) {
        *self.slot.write().unwrap() = None;
    }
}

/// Process-memory credential holder, mirrored to a [`CredentialCache`].
pub struct TokenStore {
    current: RwLock<Option<Credential>>,
    mirror: Box<dyn CredentialCache>,
}

impl TokenStore {
    /// Builds the store, pre-populating from the durable mirror if a
    /// credential survived the last run.
    pub fn new(mirror: Box<dyn CredentialCache>) -> Self {
        let current = mirror.load().map(Credential::new);
        if current.is_some() {
            tracing::debug!("restored access credential from durable mirror");
        }
        Self {
            current: RwLock::new(current),
            mirror,
        }
    }

    pub fn get(&self) -> Option<Credential> {
        self.current.read().unwrap().clone()
    }

    pub fn set(&self, credential: Credential) {
        self.mirror.store(credential.as_str());
        *self.current.write().unwrap() = Some(credential);
    }

    pub fn clear(&self) {
        self.mirror.clear();
        *self.current.write().unwrap() = None;
    }
}
