//! Bounded real-time activity feed.
//!
//! One `FeedSession` per mounted view merges the one-shot historical
//! bootstrap with the live channel into a single ordered, capacity-limited
//! sequence:
//! 1. The live subscription opens first; entries that arrive before the
//!    bootstrap resolves are held in a side buffer.
//! 2. The bootstrap populates the feed oldest-first.
//! 3. The side buffer drains in arrival order, so every bootstrap entry is
//!    logically older than any live entry regardless of wire timing.
//!
//! The operator pause gate sits in front of admission: while paused, live
//! entries are dropped outright (the buffer freezes at the pause-time
//! snapshot). A failed bootstrap leaves the feed empty and is reported on
//! the error channel; live ingestion proceeds independently.

pub mod bootstrap;
pub mod buffer;
pub mod entry;
pub mod live;

pub use buffer::{BoundedFeed, PauseGate};
pub use entry::{LogEntry, LogLevel};
pub use live::{LiveChannelAdapter, LOG_EVENT};

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::auth::Credential;
use crate::errors::ClientError;
use crate::gateway::RequestGateway;

enum Phase {
    /// Bootstrap not yet settled; live entries wait in the side buffer.
    Bootstrapping { early: Vec<LogEntry> },
    Ready,
}

struct SessionInner {
    feed: BoundedFeed,
    phase: Phase,
}

/// View-scoped feed state: the bounded buffer, the merge phase, and the
/// pause gate. Admitted entries are also broadcast so a view can render
/// incrementally instead of re-reading snapshots.
pub struct FeedSession {
    inner: Mutex<SessionInner>,
    gate: PauseGate,
    updates: broadcast::Sender<LogEntry>,
}

impl FeedSession {
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(16));
        Self {
            inner: Mutex::new(SessionInner {
                feed: BoundedFeed::new(capacity),
                phase: Phase::Bootstrapping { early: Vec::new() },
            }),
            gate: PauseGate::new(),
            updates,
        }
    }

    /// Handles one entry from the live channel. Paused → dropped, no
    /// memory retained. Bootstrapping → held aside. Ready → admitted.
    pub fn apply_live(&self, entry: LogEntry) {
        if self.gate.is_paused() {
            tracing::trace!("paused; dropping live entry");
            return;
        }
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Bootstrapping { early } => {
                // The side buffer honours the same bound as the feed:
                // anything beyond capacity would be evicted on merge anyway.
                if early.len() == inner.feed.capacity() {
                    early.remove(0);
                }
                early.push(entry);
            }
            Phase::Ready => {
                inner.feed.admit(entry.clone());
                let _ = self.updates.send(entry);
            }
        }
    }

    /// Installs the bootstrap result (oldest-first) and drains the side
    /// buffer behind it. A second call is a no-op — the bootstrap runs once
    /// per mount.
    pub fn complete_bootstrap(&self, entries: Vec<LogEntry>) {
        let mut inner = self.inner.lock().unwrap();
        let early = match &mut inner.phase {
            Phase::Bootstrapping { early } => std::mem::take(early),
            Phase::Ready => {
                tracing::warn!("duplicate bootstrap completion ignored");
                return;
            }
        };
        inner.phase = Phase::Ready;
        for entry in entries.into_iter().chain(early) {
            inner.feed.admit(entry.clone());
            let _ = self.updates.send(entry);
        }
    }

    /// Marks the bootstrap failed: the feed starts from the live tail only.
    pub fn bootstrap_failed(&self) {
        self.complete_bootstrap(Vec::new());
    }

    pub fn set_paused(&self, paused: bool) {
        self.gate.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Empties the buffer unconditionally, independent of pause state.
    pub fn clear(&self) {
        self.inner.lock().unwrap().feed.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest-first copy of the retained entries.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.inner.lock().unwrap().feed.snapshot()
    }

    /// Stream of entries as they are admitted (bootstrap and live alike).
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.updates.subscribe()
    }
}

/// Wires a `FeedSession` to the bootstrap endpoint and the live channel.
pub struct FeedRuntime {
    session: Arc<FeedSession>,
    live: Option<LiveChannelAdapter>,
}

impl FeedRuntime {
    /// Starts a feed: opens the live subscription first (early entries are
    /// buffered), then runs the one-shot bootstrap. Errors from either leg
    /// arrive on the returned channel; neither leg stops the other.
    pub async fn start(
        gateway: Arc<RequestGateway>,
        stream_url: &Url,
        credential: Option<&Credential>,
        capacity: usize,
        bootstrap_limit: usize,
    ) -> (Self, mpsc::UnboundedReceiver<ClientError>) {
        let session = Arc::new(FeedSession::new(capacity));
        let (err_tx, err_rx) = mpsc::unbounded_channel();

        let live = match LiveChannelAdapter::connect(
            stream_url,
            credential,
            Arc::clone(&session),
            err_tx.clone(),
        )
        .await
        {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                tracing::warn!("live channel unavailable: {}", e);
                let _ = err_tx.send(e);
                None
            }
        };

        match bootstrap::fetch_recent(&gateway, bootstrap_limit).await {
            Ok(entries) => session.complete_bootstrap(entries),
            Err(e) => {
                tracing::warn!("log bootstrap failed: {}", e);
                session.bootstrap_failed();
                let _ = err_tx.send(e);
            }
        }

        (
            Self {
                session,
                live,
            },
            err_rx,
        )
    }

    pub fn session(&self) -> &Arc<FeedSession> {
        &self.session
    }

    /// Tears the view down: detaches the live subscription. Any in-flight
    /// credential refresh keeps running — the coordinator outlives views.
    pub fn detach(self) {
        if let Some(live) = &self.live {
            live.detach();
        }
    }
}
