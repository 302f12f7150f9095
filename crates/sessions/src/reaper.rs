//! Background eviction of idle sessions.
//!
//! Sessions are bounded by last activity, not by creation time: every
//! append or touch pushes the deadline out, so an actively-driven coding
//! session survives indefinitely while an abandoned one is reclaimed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use paperstack_core::session::SessionStore;

/// Periodically deletes sessions whose last activity is older than the
/// configured idle timeout.
pub struct SessionReaper {
    store: Arc<dyn SessionStore>,
    idle_timeout: Duration,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(store: Arc<dyn SessionStore>, idle_timeout: Duration, interval: Duration) -> Self {
        Self {
            store,
            idle_timeout,
            interval,
        }
    }

    /// Spawns the reap loop as a background task. The task runs until the
    /// process exits; dropping the handle does not stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately; skip it so a fresh
            // gateway does not reap before anyone has connected.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = self.reap_once().await;
                if reaped > 0 {
                    info!(count = reaped, "Reaped idle sessions");
                } else {
                    debug!("Reap pass found no idle sessions");
                }
            }
        })
    }

    /// Runs a single eviction pass and returns how many sessions were
    /// deleted.
    pub async fn reap_once(&self) -> usize {
        let now = Utc::now();
        let mut reaped = 0;
        for id in self.store.session_ids().await {
            let Some(session) = self.store.get(&id).await else {
                continue;
            };
            let idle = (now - session.last_activity)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if idle > self.idle_timeout {
                if self.store.delete(&id).await {
                    info!(
                        session_id = %id,
                        idle_secs = idle.as_secs(),
                        repo_url = %session.repo_url,
                        "Session expired"
                    );
                    reaped += 1;
                }
            }
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use chrono::Duration as ChronoDuration;
    use paperstack_core::session::RemoteSession;

    fn idle_session(id: &str, idle_secs: i64) -> RemoteSession {
        let mut session =
            RemoteSession::new(id, "https://github.com/user/repo", format!("/tmp/ws/{id}"));
        session.last_activity = Utc::now() - ChronoDuration::seconds(idle_secs);
        session
    }

    #[tokio::test]
    async fn reaps_only_idle_sessions() {
        let store = Arc::new(InMemorySessionStore::new());
        store.create(idle_session("stale", 3600)).await;
        store.create(idle_session("fresh", 1)).await;

        let reaper = SessionReaper::new(
            store.clone(),
            Duration::from_secs(1800),
            Duration::from_secs(60),
        );
        assert_eq!(reaper.reap_once().await, 1);
        assert!(store.get("stale").await.is_none());
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn activity_resets_the_clock() {
        let store = Arc::new(InMemorySessionStore::new());
        store.create(idle_session("busy", 3600)).await;
        store.touch("busy").await;

        let reaper = SessionReaper::new(
            store.clone(),
            Duration::from_secs(1800),
            Duration::from_secs(60),
        );
        assert_eq!(reaper.reap_once().await, 0);
        assert!(store.get("busy").await.is_some());
    }

    #[tokio::test]
    async fn empty_store_reaps_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let reaper = SessionReaper::new(
            store.clone(),
            Duration::from_secs(1800),
            Duration::from_secs(60),
        );
        assert_eq!(reaper.reap_once().await, 0);
    }
}
