//! In-process registry of chat sessions, keyed by session id.
//!
//! Sessions live only as long as the process, or until they sit idle longer than
//! the configured limit. Handlers take a clone of a session to run the pipeline
//! and record the finished turn on whatever session is registered by then, so a
//! clear or reconnect made meanwhile is kept.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlchat_core::{ChatSession, ConnectionConfig, Database, Turn};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

struct Entry {
    session: ChatSession,
    last_used: Instant,
}

impl Entry {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            last_used: Instant::now(),
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ChatSession) -> Uuid {
        let id = session.id;
        self.inner.lock().await.insert(id, Entry::new(session));
        id
    }

    /// Snapshot of a session. Counts as activity for idle eviction.
    pub async fn get(&self, id: Uuid) -> Option<ChatSession> {
        let mut sessions = self.inner.lock().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    /// Append a completed turn to the session currently registered under `id`.
    /// Returns false if the session was removed while the turn was produced.
    pub async fn append_turn(&self, id: Uuid, turn: Turn) -> bool {
        match self.inner.lock().await.get_mut(&id) {
            Some(entry) => {
                entry.session.history.push(turn);
                entry.last_used = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Replace the connection of an existing session. Returns false if unknown.
    pub async fn reconnect(
        &self,
        id: Uuid,
        connection: ConnectionConfig,
        database: Arc<dyn Database>,
    ) -> bool {
        let mut sessions = self.inner.lock().await;
        match sessions.remove(&id) {
            Some(entry) => {
                let session = entry.session.reconnect(connection, database);
                sessions.insert(id, Entry::new(session));
                true
            }
            None => false,
        }
    }

    /// Empty a session's history. Clearing an empty history is not an error.
    pub async fn clear_history(&self, id: Uuid) -> bool {
        match self.inner.lock().await.get_mut(&id) {
            Some(entry) => {
                entry.session.history.clear();
                entry.last_used = Instant::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.lock().await.remove(&id).is_some()
    }

    /// Drop sessions unused for at least `max_idle`, releasing their pools.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.inner.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() < max_idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Periodically evict idle sessions until shutdown fires.
pub async fn run_eviction_loop(
    registry: SessionRegistry,
    max_idle: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted idle sessions");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Session eviction loop stopping");
                break;
            }
        }
    }
}
