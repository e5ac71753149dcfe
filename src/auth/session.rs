//! Session supervision — the single path into the unauthenticated state.
//!
//! Every component that needs to end the session (exhausted refresh, an
//! explicit logout) goes through `force_logout` here. Centralizing the
//! transition prevents divergent "logged out but token still attached"
//! states. Dependent subsystems observe the session over a watch channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::token::TokenStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated { reason: String },
}

pub struct SessionSupervisor {
    tokens: Arc<TokenStore>,
    state: watch::Sender<SessionState>,
    ended: AtomicBool,
}

impl SessionSupervisor {
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        let authenticated = tokens.get().is_some();
        let initial = if authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated {
                reason: "no credential".into(),
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            tokens,
            state,
            ended: AtomicBool::new(!authenticated),
        }
    }

    /// Ends the session: clears the credential (memory and mirror) and
    /// broadcasts the unauthenticated state. Idempotent past the first
    /// call — later callers lose the race and the first reason wins.
    pub fn force_logout(&self, reason: &str) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!(reason = %reason, "forcing logout");
        self.tokens.clear();
        let _ = self.state.send(SessionState::Unauthenticated {
            reason: reason.to_string(),
        });
    }

    /// Re-enters the authenticated state after an explicit login.
    pub fn mark_authenticated(&self) {
        self.ended.store(false, Ordering::SeqCst);
        let _ = self.state.send(SessionState::Authenticated);
    }

    pub fn is_authenticated(&self) -> bool {
        !self.ended.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{Credential, MemoryCredentialCache};

    fn supervisor_with_token() -> SessionSupervisor {
        let tokens = Arc::new(TokenStore::new(Box::new(MemoryCredentialCache::default())));
        tokens.set(Credential::new("tok"));
        SessionSupervisor::new(tokens)
    }

    #[test]
    fn force_logout_clears_credential_and_notifies() {
        let sup = supervisor_with_token();
        let rx = sup.subscribe();
        assert!(sup.is_authenticated());

        sup.force_logout("refresh exhausted");

        assert!(!sup.is_authenticated());
        assert!(sup.tokens.get().is_none());
        assert_eq!(
            *rx.borrow(),
            SessionState::Unauthenticated {
                reason: "refresh exhausted".into()
            }
        );
    }

    #[test]
    fn force_logout_is_idempotent_first_reason_wins() {
        let sup = supervisor_with_token();
        let rx = sup.subscribe();

        sup.force_logout("first");
        sup.force_logout("second");

        assert_eq!(
            *rx.borrow(),
            SessionState::Unauthenticated {
                reason: "first".into()
            }
        );
    }

    #[test]
    fn mark_authenticated_reopens_session() {
        let sup = supervisor_with_token();
        sup.force_logout("bye");
        sup.mark_authenticated();
        assert!(sup.is_authenticated());
        assert_eq!(*sup.subscribe().borrow(), SessionState::Authenticated);
    }
}
