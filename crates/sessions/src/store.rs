//! In-memory session store.
//!
//! Sessions live only in process memory; a restart loses them by design.
//! The map lock is held just long enough to find an entry, then all
//! mutation happens under that entry's own mutex, so two concurrent turns
//! against the same session id append in strict arrival order while
//! distinct sessions never contend.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use paperstack_core::message::Message;
use paperstack_core::session::{CommandStep, RemoteSession, SessionStore};

type Entry = Arc<Mutex<RemoteSession>>;

/// Process-wide session store backed by a keyed map.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, id: &str) -> Option<Entry> {
        self.sessions.read().await.get(id).cloned()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: RemoteSession) -> String {
        let id = session.id.clone();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        debug!(session_id = %id, "Session created");
        id
    }

    async fn get(&self, id: &str) -> Option<RemoteSession> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        Some(session.clone())
    }

    async fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "Session deleted");
        }
        removed
    }

    async fn append_message(&self, id: &str, message: Message) -> bool {
        let Some(entry) = self.entry(id).await else {
            return false;
        };
        let mut session = entry.lock().await;
        session.messages.push(message);
        session.last_activity = Utc::now();
        true
    }

    async fn append_step(&self, id: &str, step: CommandStep) -> bool {
        let Some(entry) = self.entry(id).await else {
            return false;
        };
        let mut session = entry.lock().await;
        session.steps.push(step);
        session.last_activity = Utc::now();
        true
    }

    async fn touch(&self, id: &str) -> bool {
        let Some(entry) = self.entry(id).await else {
            return false;
        };
        entry.lock().await.last_activity = Utc::now();
        true
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
