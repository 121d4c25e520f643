use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

use super::debouncer::Debouncer;
use crate::models::DocumentPatch;
use crate::store::DocumentStore;

/// Local shadow of a document's content with debounced write-back.
///
/// The shadow is updated optimistically on every local save. Remote updates
/// overwrite it on arrival; local edits overwrite the store on the next
/// flush. Whichever write the store sees last wins.
///
/// `stored` is the last content known to be in the store. A pushed document
/// carrying exactly that content is an echo (of our own flush, or of a write
/// that only touched presence) and never replaces unsaved local edits.
pub struct ContentSynchronizer {
    document_id: String,
    store: Arc<dyn DocumentStore>,
    shadow: RwLock<String>,
    stored: Arc<Mutex<String>>,
    debouncer: Debouncer,
    delay: Duration,
}

impl ContentSynchronizer {
    /// `initial` doubles as the last known stored content.
    pub fn new(document_id: impl Into<String>, store: Arc<dyn DocumentStore>, initial: String, delay: Duration) -> Self {
        Self {
            document_id: document_id.into(),
            store,
            stored: Arc::new(Mutex::new(initial.clone())),
            shadow: RwLock::new(initial),
            debouncer: Debouncer::new("content"),
            delay,
        }
    }

    pub fn content(&self) -> String {
        self.shadow.read().clone()
    }

    /// Returns false when `new_content` matches the shadow and nothing was scheduled.
    pub fn save(&self, new_content: String) -> bool {
        // Held while arming so concurrent saves flush in the order they hit the shadow.
        let mut shadow = self.shadow.write();
        if *shadow == new_content {
            return false;
        }
        *shadow = new_content.clone();

        let store = self.store.clone();
        let stored = self.stored.clone();
        let document_id = self.document_id.clone();
        self.debouncer.arm(self.delay, async move {
            // Set before the write: the push can arrive before the write returns.
            let previous = std::mem::replace(&mut *stored.lock(), new_content.clone());
            match store.update(&document_id, DocumentPatch::content(new_content.clone())).await {
                Ok(_) => debug!("Successfully saved update to document {}", document_id),
                Err(e) => {
                    error!("Failed to save update to document {}: {}", document_id, e);
                    let mut stored = stored.lock();
                    if *stored == new_content {
                        *stored = previous;
                    }
                }
            }
        });
        true
    }

    /// Adopts remote content. Returns true when the shadow changed.
    pub fn apply_remote(&self, content: &str) -> bool {
        let mut shadow = self.shadow.write();
        let mut stored = self.stored.lock();
        if *shadow == content {
            *stored = content.to_string();
            return false;
        }
        if *stored == content {
            trace!("Ignoring echo of stored content on document {}", self.document_id);
            return false;
        }
        *shadow = content.to_string();
        *stored = content.to_string();
        true
    }

    pub fn has_pending_flush(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Drops a pending flush without writing it.
    pub fn cancel(&self) -> bool {
        self.debouncer.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::store::MemoryStore;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(100);

    fn content_writes(store: &MemoryStore) -> Vec<String> {
        store.history().into_iter().filter_map(|(_, patch)| patch.content).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_content_is_never_written() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", "same"));
        let sync = ContentSynchronizer::new("d1", store.clone(), "same".to_string(), DELAY);

        assert!(!sync.save("same".to_string()));
        sleep(DELAY * 3).await;
        assert!(content_writes(&store).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_keeps_optimistic_shadow() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", "before"));
        store.fail_writes(true);
        let sync = ContentSynchronizer::new("d1", store.clone(), "before".to_string(), DELAY);

        sync.save("after".to_string());
        sleep(DELAY * 3).await;

        assert_eq!(sync.content(), "after");
        assert_eq!(store.get("d1").unwrap().content, "before");
        assert!(!sync.has_pending_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_content_replaces_shadow() {
        let store = Arc::new(MemoryStore::new());
        let sync = ContentSynchronizer::new("d1", store, "mine".to_string(), DELAY);

        assert!(sync.apply_remote("theirs"));
        assert!(!sync.apply_remote("theirs"));
        assert_eq!(sync.content(), "theirs");
    }

    #[tokio::test(start_paused = true)]
    async fn echo_of_stored_content_keeps_unsaved_edits() {
        let store = Arc::new(MemoryStore::new());
        let sync = ContentSynchronizer::new("d1", store, "stored".to_string(), DELAY);

        sync.save("stored + typed".to_string());
        assert!(!sync.apply_remote("stored"));
        assert_eq!(sync.content(), "stored + typed");

        assert!(sync.apply_remote("someone else"));
        assert_eq!(sync.content(), "someone else");
    }

    #[tokio::test(start_paused = true)]
    async fn echo_of_own_flush_keeps_later_keystrokes() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", ""));
        let sync = ContentSynchronizer::new("d1", store.clone(), String::new(), DELAY);

        sync.save("x".to_string());
        sleep(DELAY * 2).await;
        assert_eq!(content_writes(&store), vec!["x".to_string()]);

        sync.save("xy".to_string());
        assert!(!sync.apply_remote("x"));
        assert_eq!(sync.content(), "xy");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_does_not_mark_content_stored() {
        let store = Arc::new(MemoryStore::new());
        store.insert(Document::new("d1", "before"));
        store.fail_writes(true);
        let sync = ContentSynchronizer::new("d1", store.clone(), "before".to_string(), DELAY);

        sync.save("lost".to_string());
        sleep(DELAY * 2).await;
        sync.save("after".to_string());

        // "lost" never reached the store, so a push carrying it is real remote content.
        assert!(sync.apply_remote("lost"));
        assert_eq!(sync.content(), "lost");
    }
}
