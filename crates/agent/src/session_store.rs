use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use wayfarer_core::SessionState;

pub type SessionHandle = Arc<AsyncMutex<SessionState>>;

/// Per-user sessions. Holding a handle's lock for the whole turn serializes
/// turns of one user while other users proceed.
pub struct SessionStore {
    history_limit: usize,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn handle(&self, user_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(user_id.to_owned())
            .or_insert_with(|| Arc::new(AsyncMutex::new(SessionState::new(self.history_limit))))
            .clone()
    }

    /// Drops the user's session; the next turn starts from a fresh state.
    pub fn reset(&self, user_id: &str) -> bool {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SessionStore;

    #[tokio::test]
    async fn same_user_shares_one_session() {
        let store = SessionStore::new(12);
        store.handle("42").lock().await.country = Some("Japan".into());

        assert_eq!(store.handle("42").lock().await.country.as_deref(), Some("Japan"));
        assert_eq!(store.handle("7").lock().await.country, None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn reset_starts_over() {
        let store = SessionStore::new(12);
        store.handle("42").lock().await.city = Some("Kyoto".into());

        assert!(store.reset("42"));
        assert!(!store.reset("42"));
        assert_eq!(store.handle("42").lock().await.city, None);
    }

    #[tokio::test]
    async fn a_held_session_blocks_only_its_owner() {
        let store = Arc::new(SessionStore::new(12));
        let held = store.handle("42");
        let _guard = held.lock().await;

        assert!(store.handle("42").try_lock().is_err());
        assert!(store.handle("7").try_lock().is_ok());
    }
}
