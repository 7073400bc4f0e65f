//! Per-session conversation state, keyed by the session cookie.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::window::ConversationState;

pub struct Session {
    state: Mutex<ConversationState>,
    last_active: StdMutex<Instant>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: Mutex::new(ConversationState::new()),
            last_active: StdMutex::new(Instant::now()),
        }
    }

    /// Waits for any in-flight turn of the same session.
    pub async fn lock(&self) -> MutexGuard<'_, ConversationState> {
        let guard = self.state.lock().await;
        self.touch();
        guard
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_active.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new()))
            .clone()
    }

    /// Returns true when a session was removed.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions idle for at least `ttl`. Sessions with a turn in flight are kept.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            let busy = session.state.try_lock().is_err();
            busy || session.idle_for() < ttl
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }
}
