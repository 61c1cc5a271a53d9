//! Session registry — one `SessionHistory` per browser tab.
//!
//! Each session owns its history behind an async mutex held for the whole
//! scan, so actions within a session run one at a time. Idle sessions are
//! dropped by [`run_sweep_loop`].

use chrono::{DateTime, Utc};
use nutriscan_core::SessionHistory;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    history: Mutex<SessionHistory>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            history: Mutex::new(SessionHistory::new()),
        }
    }

    pub async fn history(&self) -> MutexGuard<'_, SessionHistory> {
        self.history.lock().await
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    last_active: Instant,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub async fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.write().await.insert(
            session.id,
            Entry {
                session: Arc::clone(&session),
                last_active: Instant::now(),
            },
        );
        tracing::info!(session_id = %session.id, "Session started");
        session
    }

    /// Fetch a session and mark it active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    /// End a session, discarding its history. Returns false if unknown.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the timeout. Returns how many went.
    pub async fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now()).await
    }

    async fn sweep_idle_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| now.saturating_duration_since(e.last_active) <= self.idle_timeout);
        before - sessions.len()
    }
}

/// Periodically evict idle sessions until shutdown fires.
pub async fn run_sweep_loop(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.sweep_idle().await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    tracing::info!(evicted, remaining, "Evicted idle sessions");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down...");
                break;
            }
        }
    }
}
