use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Teardown for one session; runs at most once.
pub type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Entry {
    session_id: Uuid,
    cleanup: CleanupFn,
}

/// Tracks the single active session per document in this process.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("documents", &self.documents())
            .finish()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. Any entry it displaces is handed back so the
    /// caller can run its cleanup.
    pub fn register(&self, document_id: &str, session_id: Uuid, cleanup: CleanupFn) -> Option<CleanupFn> {
        debug!("Registering session {} for document {}", session_id, document_id);
        self.entries
            .lock()
            .insert(document_id.to_string(), Entry { session_id, cleanup })
            .map(|displaced| displaced.cleanup)
    }

    /// Removes the entry only if it still belongs to `session_id`.
    pub fn deregister(&self, document_id: &str, session_id: Uuid) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(document_id) {
            Some(entry) if entry.session_id == session_id => {
                entries.remove(document_id);
                debug!("Deregistered session {} for document {}", session_id, document_id);
                true
            }
            _ => false,
        }
    }

    pub fn take(&self, document_id: &str) -> Option<CleanupFn> {
        self.entries.lock().remove(document_id).map(|entry| entry.cleanup)
    }

    /// Removes and runs the cleanup of the session currently bound to
    /// `document_id`. Returns true when one ran.
    pub async fn replace(&self, document_id: &str) -> bool {
        // Lock released before awaiting the cleanup.
        let previous = self.take(document_id);
        match previous {
            Some(cleanup) => {
                info!("Cleaning up existing session for document: {}", document_id);
                cleanup().await;
                true
            }
            None => false,
        }
    }

    /// Runs every registered cleanup.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Entry)> = self.entries.lock().drain().collect();
        for (document_id, entry) in drained {
            info!("Shutting down session for document: {}", document_id);
            (entry.cleanup)().await;
        }
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.entries.lock().contains_key(document_id)
    }

    pub fn session_id(&self, document_id: &str) -> Option<Uuid> {
        self.entries.lock().get(document_id).map(|entry| entry.session_id)
    }

    pub fn documents(&self) -> Vec<String> {
        let mut docs: Vec<String> = self.entries.lock().keys().cloned().collect();
        docs.sort();
        docs
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cleanup(counter: &Arc<AtomicUsize>) -> CleanupFn {
        let counter = counter.clone();
        Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn replace_runs_the_previous_cleanup_once() {
        let registry = SessionRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        assert!(registry.register("d1", Uuid::new_v4(), counting_cleanup(&runs)).is_none());

        assert!(registry.replace("d1").await);
        assert!(!registry.replace("d1").await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn register_hands_back_displaced_entry() {
        let registry = SessionRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        registry.register("d1", Uuid::new_v4(), counting_cleanup(&runs));
        let displaced = registry.register("d1", Uuid::new_v4(), counting_cleanup(&runs));

        displaced.expect("displaced entry")().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn deregister_ignores_stale_sessions() {
        let registry = SessionRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let stale = Uuid::new_v4();
        let current = Uuid::new_v4();
        registry.register("d1", current, counting_cleanup(&runs));

        assert!(!registry.deregister("d1", stale));
        assert!(registry.contains("d1"));
        assert!(registry.deregister("d1", current));
        assert!(!registry.contains("d1"));
    }

    #[tokio::test]
    async fn shutdown_runs_all_cleanups() {
        let registry = SessionRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));
        registry.register("a", Uuid::new_v4(), counting_cleanup(&runs));
        registry.register("b", Uuid::new_v4(), counting_cleanup(&runs));
        assert_eq!(registry.documents(), vec!["a".to_string(), "b".to_string()]);

        registry.shutdown().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }
}
