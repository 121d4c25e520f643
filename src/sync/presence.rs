use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::debouncer::Debouncer;
use crate::models::{CursorRange, DocumentPatch, Presence, PresenceTable};
use crate::store::DocumentStore;

#[derive(Debug, Default)]
struct PresenceState {
    table: PresenceTable,
    /// Latest local entry; re-applied over every remote table.
    own: Option<Presence>,
}

impl PresenceState {
    fn overlay(&self, mut table: PresenceTable) -> PresenceTable {
        if let Some(own) = &self.own {
            table.insert(own.clone());
        }
        table
    }
}

fn snapshot(state: &Mutex<PresenceState>) -> PresenceTable {
    let state = state.lock();
    state.overlay(state.table.clone())
}

/// Per-user cursor and liveness for one document.
///
/// The whole table is always written back, never a single entry, so two
/// clients flushing at once can briefly drop each other's latest entry.
pub struct PresenceTracker {
    document_id: String,
    user_id: String,
    user_name: String,
    supported: bool,
    store: Arc<dyn DocumentStore>,
    state: Arc<Mutex<PresenceState>>,
    debouncer: Debouncer,
    delay: Duration,
}

impl PresenceTracker {
    /// `seed` is the fetched table; `None` disables presence for the session.
    pub fn new(
        document_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        seed: Option<PresenceTable>,
        delay: Duration,
    ) -> Self {
        let supported = seed.is_some();
        Self {
            document_id: document_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            supported,
            store,
            state: Arc::new(Mutex::new(PresenceState {
                table: seed.unwrap_or_default(),
                own: None,
            })),
            debouncer: Debouncer::new("presence"),
            delay,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn table(&self) -> PresenceTable {
        self.state.lock().table.clone()
    }

    pub fn active(&self, idle: Duration) -> Vec<Presence> {
        let mut active: Vec<Presence> = self
            .state
            .lock()
            .table
            .iter()
            .filter(|p| p.is_active(idle))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.user_id.cmp(&b.user_id)));
        active
    }

    /// Publishes the local user's entry with no cursor.
    pub fn announce(&self) {
        if self.supported {
            self.update(None);
        }
    }

    /// Returns false when presence is unsupported and nothing happened.
    pub fn update(&self, cursor: Option<CursorRange>) -> bool {
        if !self.supported {
            debug!("Presence not available on document {}; ignoring update", self.document_id);
            return false;
        }

        let presence = Presence::new(self.user_id.clone(), self.user_name.clone(), cursor);
        {
            let mut state = self.state.lock();
            state.own = Some(presence.clone());
            state.table.insert(presence);
        }

        let state = self.state.clone();
        let store = self.store.clone();
        let document_id = self.document_id.clone();
        self.debouncer.arm(self.delay, async move {
            let table = snapshot(&state);
            match store.update(&document_id, DocumentPatch::presence(table)).await {
                Ok(_) => debug!("Presence saved for document {}", document_id),
                Err(e) => error!("Failed to save presence for document {}: {}", document_id, e),
            }
        });
        true
    }

    /// Replaces the local table with a remote one. Returns the new table when
    /// it differs by value from what was held before.
    pub fn apply_remote(&self, remote: PresenceTable) -> Option<PresenceTable> {
        if !self.supported {
            return None;
        }
        let mut state = self.state.lock();
        let merged = state.overlay(remote);
        if merged == state.table {
            return None;
        }
        state.table = merged.clone();
        Some(merged)
    }

    /// Drops any pending flush and removes the local user's entry from the
    /// store right away.
    pub async fn depart(&self) {
        if !self.supported {
            return;
        }
        self.debouncer.cancel();
        let table = {
            let mut state = self.state.lock();
            state.own = None;
            state.table.remove(&self.user_id);
            state.table.clone()
        };
        match self.store.update(&self.document_id, DocumentPatch::presence(table)).await {
            Ok(_) => info!("Presence cleared for user {} on document {}", self.user_id, self.document_id),
            Err(e) => warn!("Failed to clear presence on document {}: {}", self.document_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::store::MemoryStore;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(10);

    fn tracker(store: &Arc<MemoryStore>, user: &str) -> PresenceTracker {
        let seed = store.get("d1").and_then(|d| d.presence);
        PresenceTracker::new("d1", user, user.to_uppercase(), store.clone(), seed, DELAY)
    }

    #[tokio::test(start_paused = true)]
    async fn local_update_is_instant_and_flush_is_debounced() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", ""));
        let presence = tracker(&store, "u1");

        presence.update(Some(CursorRange::caret(1)));
        presence.update(Some(CursorRange::caret(2)));
        presence.update(Some(CursorRange::new(5, 3)));
        assert_eq!(presence.table().get("u1").unwrap().cursor, Some(CursorRange::new(3, 5)));
        assert!(store.history().is_empty());

        sleep(DELAY * 5).await;
        let history = store.history();
        assert_eq!(history.len(), 1);
        let persisted = store.get("d1").unwrap().presence.unwrap();
        assert_eq!(persisted.get("u1").unwrap().cursor, Some(CursorRange::new(3, 5)));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_schema_makes_updates_no_ops() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::without_presence("d1", ""));
        let presence = tracker(&store, "u1");

        assert!(!presence.is_supported());
        assert!(!presence.update(Some(CursorRange::caret(0))));
        presence.depart().await;
        sleep(DELAY * 5).await;
        assert!(store.history().is_empty());
        assert!(presence.table().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_tables_replace_wholesale_but_keep_own_entry() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", ""));
        let presence = tracker(&store, "u1");
        presence.update(Some(CursorRange::caret(4)));

        let mut remote = PresenceTable::default();
        remote.insert(Presence::new("u2", "U2", None));
        let applied = presence.apply_remote(remote.clone()).expect("table changed");

        assert!(applied.contains("u2"));
        assert_eq!(applied.get("u1").unwrap().cursor, Some(CursorRange::caret(4)));
        assert!(presence.apply_remote(remote).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn depart_removes_own_entry_immediately() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", ""));
        let presence = tracker(&store, "u1");
        presence.update(Some(CursorRange::caret(1)));
        sleep(DELAY * 5).await;
        assert!(store.get("d1").unwrap().presence.unwrap().contains("u1"));

        presence.update(Some(CursorRange::caret(2)));
        presence.depart().await;
        sleep(DELAY * 5).await;

        assert!(!store.get("d1").unwrap().presence.unwrap().contains("u1"));
        assert_eq!(store.history().len(), 2);
    }
}
