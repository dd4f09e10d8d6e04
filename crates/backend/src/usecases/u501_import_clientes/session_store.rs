use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::session::ImportSession;

pub type SharedSession = Arc<Mutex<ImportSession>>;

/// Хранилище сессий импорта (in-memory)
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать новую сессию
    pub async fn insert(&self, session: ImportSession) -> SharedSession {
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(session_id)
    }

    /// Удаляет сессии, которые не менялись дольше `max_age_hours`.
    /// Занятые сессии (идёт сохранение) не трогаются.
    pub async fn cleanup_old_sessions(&self, max_age_hours: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let now = chrono::Utc::now();
        sessions.retain(|_, shared| match shared.try_lock() {
            Ok(session) => (now - session.updated_at).num_hours() < max_age_hours,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::shared::validation::ValidationOptions;
    use contracts::usecases::u501_import_clientes::RawSheet;
    use std::collections::HashSet;

    fn session(id: &str) -> ImportSession {
        let parsed = RawSheet::from_text(
            "clientes.csv",
            vec![
                vec!["Cédula".into(), "Nombres".into()],
                vec!["V12345678".into(), "Ana Diaz".into()],
            ],
        )
        .into_rows()
        .unwrap();
        ImportSession::new(id.into(), parsed, HashSet::new(), ValidationOptions::default())
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_idle_sessions() {
        let store = SessionStore::new();
        let stale = store.insert(session("stale")).await;
        store.insert(session("fresh")).await;
        let busy = store.insert(session("busy")).await;

        let long_ago = chrono::Utc::now() - chrono::Duration::hours(30);
        stale.lock().await.updated_at = long_ago;
        busy.lock().await.updated_at = long_ago;

        // a session locked by a running save survives this pass
        let guard = busy.lock().await;
        assert_eq!(store.cleanup_old_sessions(24).await, 1);
        drop(guard);

        assert!(store.get("stale").await.is_none());
        assert!(store.get("fresh").await.is_some());
        assert!(store.get("busy").await.is_some());

        assert_eq!(store.cleanup_old_sessions(24).await, 1);
        assert!(store.get("busy").await.is_none());
    }
}
