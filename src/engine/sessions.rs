//! In-memory session management

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CanvasSettings;
use crate::domain::EditorMode;
use super::editor::{EditorError, EditorSession};
use super::registry::PrintAreaRegistry;

pub type SharedSession = Arc<Mutex<EditorSession>>;

struct SessionEntry {
    session: SharedSession,
    last_touched: Mutex<Instant>,
}

impl SessionEntry {
    fn new(session: SharedSession) -> Self {
        SessionEntry {
            session,
            last_touched: Mutex::new(Instant::now()),
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_touched.lock().elapsed()
    }
}

/// Owns every live editing session
///
/// Sessions are handed out by reference; nothing reaches them through
/// global state. Every lookup counts as activity for idle expiry.
pub struct SessionManager {
    sessions: DashMap<Uuid, SessionEntry>,
    registry: Arc<PrintAreaRegistry>,
    settings: CanvasSettings,
}

impl SessionManager {
    pub fn new(registry: Arc<PrintAreaRegistry>, settings: CanvasSettings) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<PrintAreaRegistry> {
        &self.registry
    }

    /// Start a session for a product
    pub fn create(
        &self,
        product_id: &str,
        color: Option<String>,
        mode: EditorMode,
    ) -> Result<(Uuid, SharedSession), EditorError> {
        let session = EditorSession::new(
            Arc::clone(&self.registry),
            product_id,
            color,
            mode,
            self.settings.clone(),
        )?;
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, SessionEntry::new(Arc::clone(&shared)));
        Ok((id, shared))
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| {
            *entry.last_touched.lock() = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Editing session closed");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions not looked up within `idle_timeout`
    ///
    /// Returns how many were removed. A handler still holding a session it
    /// fetched keeps working on its own copy of the `Arc`.
    pub fn expire_idle(&self, idle_timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, entry| {
            let keep = entry.idle_for() < idle_timeout;
            if !keep {
                info!(session_id = %id, idle_secs = entry.idle_for().as_secs(), "Idle editing session expired");
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }
}

/// Periodically expire idle sessions until the returned task is aborted
pub fn spawn_idle_sweeper(
    manager: Arc<SessionManager>,
    idle_timeout: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let expired = manager.expire_idle(idle_timeout);
            if expired > 0 {
                debug!(expired, remaining = manager.session_count(), "Idle session sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_remove() {
        let registry = Arc::new(PrintAreaRegistry::builtin().unwrap());
        let manager = SessionManager::new(registry, CanvasSettings::default());

        let (id, session) = manager.create("tshirt-regular-short", None, EditorMode::FreeForm).unwrap();
        assert_eq!(session.lock().id(), id);
        assert_eq!(manager.session_count(), 1);
        assert!(manager.get(&id).is_some());

        assert!(manager.remove(&id));
        assert!(!manager.remove(&id));
        assert!(manager.get(&id).is_none());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let registry = Arc::new(PrintAreaRegistry::builtin().unwrap());
        let manager = SessionManager::new(registry, CanvasSettings::default());

        let (stale, _) = manager.create("tshirt-regular-short", None, EditorMode::FreeForm).unwrap();
        let (busy, _) = manager.create("tshirt-regular-short", None, EditorMode::FreeForm).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(manager.get(&busy).is_some());

        assert_eq!(manager.expire_idle(Duration::from_millis(30)), 1);
        assert!(manager.get(&stale).is_none());
        assert!(manager.get(&busy).is_some());
        assert_eq!(manager.expire_idle(Duration::from_secs(3600)), 0);
    }

    #[tokio::test]
    async fn test_sweeper_removes_idle_sessions() {
        let registry = Arc::new(PrintAreaRegistry::builtin().unwrap());
        let manager = Arc::new(SessionManager::new(registry, CanvasSettings::default()));
        manager.create("tshirt-regular-short", None, EditorMode::FreeForm).unwrap();

        let sweeper = spawn_idle_sweeper(Arc::clone(&manager), Duration::ZERO, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.session_count(), 0);
        sweeper.abort();
    }

    #[test]
    fn test_unknown_product_not_registered() {
        let registry = Arc::new(PrintAreaRegistry::builtin().unwrap());
        let manager = SessionManager::new(registry, CanvasSettings::default());

        assert!(manager.create("nope", None, EditorMode::FreeForm).is_err());
        assert_eq!(manager.session_count(), 0);
    }
}
