//! In-memory session store.
//!
//! Each sender gets its own `Mutex<Session>`. Holding the guard returned by
//! [`SessionStore::lock`] is what serializes concurrent deliveries for one
//! sender; different senders never contend beyond the brief map lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::conversation::Session;

/// Exclusive access to one sender's live session. Writes through the guard
/// are the save.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Process-wide mapping from sender phone number to session.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    /// Create a store. Sessions idle longer than `idle_timeout` restart in `Start`.
    pub fn new(idle_timeout: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        })
    }

    /// Lock the sender's session, creating a fresh one if absent.
    ///
    /// Waits while another task holds the same sender's guard.
    pub async fn lock(&self, sender: &str) -> SessionGuard {
        let slot = self.slot(sender).await;
        let mut guard = slot.lock_owned().await;

        if let Some(idle) = self.idle_timeout {
            if guard.is_idle(idle, Utc::now()) {
                debug!(sender = %sender, state = %guard.state, "Idle session reset");
                *guard = Session::new(sender);
            }
        }
        guard
    }

    /// Snapshot of the sender's session. Never fails; unseen senders get a
    /// fresh `Start` session.
    ///
    /// Must not be called while holding this sender's guard.
    pub async fn get(&self, sender: &str) -> Session {
        self.lock(sender).await.clone()
    }

    /// Overwrite the session for `session.sender` (last write wins).
    ///
    /// Must not be called while holding this sender's guard.
    pub async fn save(&self, session: Session) {
        let mut guard = self.lock(&session.sender).await;
        *guard = session;
    }

    /// Number of tracked senders.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions that have been idle past the timeout and are not in use.
    /// Returns the number removed. No-op when expiry is disabled.
    pub async fn evict_idle(&self) -> usize {
        let Some(idle) = self.idle_timeout else {
            return 0;
        };
        let now = Utc::now();

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            // Anyone holding a clone of the slot is about to lock it.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => !session.is_idle(idle, now),
                Err(_) => true,
            }
        });
        let removed = before - sessions.len();

        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Evicted idle sessions");
        }
        removed
    }

    async fn slot(&self, sender: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(sender.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(sender)))),
        )
    }
}

/// Spawn a background task that evicts idle sessions every `every`.
pub fn spawn_sweep_task(store: Arc<SessionStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.evict_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationState;

    #[tokio::test]
    async fn get_creates_fresh_session() {
        let store = SessionStore::new(None);
        assert!(store.is_empty().await);

        let session = store.get("111").await;
        assert_eq!(session.sender, "111");
        assert_eq!(session.state, ConversationState::Start);
        assert_eq!(store.len().await, 1);

        // Idempotent.
        let again = store.get("111").await;
        assert_eq!(again, session);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn save_overwrites() {
        let store = SessionStore::new(None);
        let mut session = store.get("111").await;
        session.choose_category("mixing");
        store.save(session.clone()).await;

        assert_eq!(store.get("111").await, session);
    }

    #[tokio::test]
    async fn guard_writes_are_visible() {
        let store = SessionStore::new(None);
        {
            let mut guard = store.lock("111").await;
            guard.choose_category("mixing");
        }
        let session = store.get("111").await;
        assert_eq!(session.state, ConversationState::CategoryChosen);
    }

    #[tokio::test]
    async fn same_sender_is_serialized() {
        let store = SessionStore::new(None);
        let guard = store.lock("111").await;

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("111").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "second access must wait for the guard");

        drop(guard);
        let session = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.sender, "111");
    }

    #[tokio::test]
    async fn different_senders_do_not_block() {
        let store = SessionStore::new(None);
        let _guard = store.lock("111").await;
        let other = tokio::time::timeout(Duration::from_millis(500), store.get("222")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = SessionStore::new(None);
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut guard = store.lock("111").await;
                    let mut machines = guard.machine.clone().unwrap_or_default();
                    tokio::task::yield_now().await;
                    machines.push_str(&format!("{i},"));
                    guard.machine = Some(machines);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let session = store.get("111").await;
        let written = session.machine.unwrap();
        assert_eq!(written.split(',').filter(|s| !s.is_empty()).count(), 20);
    }

    #[tokio::test]
    async fn idle_session_resets_on_access() {
        let store = SessionStore::new(Some(Duration::from_secs(60)));
        {
            let mut guard = store.lock("111").await;
            guard.choose_category("mixing");
            guard.updated_at = Utc::now() - chrono::Duration::minutes(5);
        }
        let session = store.get("111").await;
        assert_eq!(session.state, ConversationState::Start);
        assert!(session.category.is_none());
    }

    #[tokio::test]
    async fn no_expiry_when_disabled() {
        let store = SessionStore::new(None);
        {
            let mut guard = store.lock("111").await;
            guard.choose_category("mixing");
            guard.updated_at = Utc::now() - chrono::Duration::days(30);
        }
        assert_eq!(store.get("111").await.state, ConversationState::CategoryChosen);
        assert_eq!(store.evict_idle().await, 0);
    }

    #[tokio::test]
    async fn evict_removes_only_idle_unlocked() {
        let store = SessionStore::new(Some(Duration::from_secs(60)));
        for sender in ["idle", "busy", "fresh"] {
            store.get(sender).await;
        }
        for sender in ["idle", "busy"] {
            let mut guard = store.lock(sender).await;
            guard.updated_at = Utc::now() - chrono::Duration::minutes(5);
        }

        // Reach the raw slot so the lock is held without the idle reset.
        let busy_slot = store.slot("busy").await;
        let _held = busy_slot.lock().await;

        assert_eq!(store.evict_idle().await, 1);
        assert_eq!(store.len().await, 2);
    }
}
