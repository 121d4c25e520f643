use chrono::Utc;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DocumentStore, StoreError, Subscription};
use crate::models::{Document, DocumentPatch, StoreEvent};

const CHANNEL_CAPACITY: usize = 100;

/// In-process document store with one broadcast channel per document.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Document>>,
    channels: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
    history: Mutex<Vec<(String, DocumentPatch)>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a document and notify subscribers of its creation.
    pub fn insert(&self, mut document: Document) -> Document {
        document.message = None;
        document.updated_at = Utc::now();
        self.documents.lock().insert(document.id.clone(), document.clone());
        info!("Document created: {}", document.id);
        self.publish(StoreEvent::create(document.clone()));
        document
    }

    /// Create a document, failing if the id is already taken.
    pub fn try_create(&self, id: Option<String>, content: impl Into<String>, presence: bool) -> Result<Document, StoreError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let document = if presence {
            Document::new(id, content)
        } else {
            Document::without_presence(id, content)
        };

        {
            let mut documents = self.documents.lock();
            if documents.contains_key(&document.id) {
                return Err(StoreError::AlreadyExists(document.id));
            }
            documents.insert(document.id.clone(), document.clone());
        }
        info!("Document created: {}", document.id);
        self.publish(StoreEvent::create(document.clone()));
        Ok(document)
    }

    pub fn get(&self, document_id: &str) -> Option<Document> {
        self.documents.lock().get(document_id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().len()
    }

    /// Every accepted patch, in write order.
    pub fn history(&self) -> Vec<(String, DocumentPatch)> {
        self.history.lock().clone()
    }

    /// Reject every subsequent write until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Receivers across every document's channel.
    pub fn total_subscribers(&self) -> usize {
        self.channels.lock().values().map(|tx| tx.receiver_count()).sum()
    }

    pub fn subscriber_count(&self, document_id: &str) -> usize {
        self.channels
            .lock()
            .get(document_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    fn channel(&self, document_id: &str) -> broadcast::Sender<StoreEvent> {
        self.channels
            .lock()
            .entry(document_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn publish(&self, event: StoreEvent) {
        let tx = self.channel(&event.payload.id);
        // No receivers is not an error; nobody is watching this document.
        let _ = tx.send(event);
    }

    fn apply(&self, document_id: &str, patch: DocumentPatch) -> Result<Document, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            warn!("Rejecting write to document {}", document_id);
            return Err(StoreError::Transport("write rejected".to_string()));
        }

        let mut event_payload = {
            let mut documents = self.documents.lock();
            let document = documents
                .get_mut(document_id)
                .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;

            if patch.presence.is_some() && document.presence.is_none() {
                return Err(StoreError::UnknownAttribute("presence".to_string()));
            }
            if let Some(content) = &patch.content {
                document.content = content.clone();
            }
            if let Some(presence) = &patch.presence {
                document.presence = Some(presence.clone());
            }
            document.updated_at = Utc::now();
            document.clone()
        };

        self.history.lock().push((document_id.to_string(), patch.clone()));
        debug!("Document {} updated", document_id);

        let persisted = event_payload.clone();
        event_payload.message = patch.message;
        self.publish(StoreEvent::update(event_payload));
        Ok(persisted)
    }
}

impl DocumentStore for MemoryStore {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, StoreError>> {
        Box::pin(async move {
            self.get(document_id)
                .ok_or_else(|| StoreError::NotFound(document_id.to_string()))
        })
    }

    fn update<'a>(&'a self, document_id: &'a str, patch: DocumentPatch) -> BoxFuture<'a, Result<Document, StoreError>> {
        Box::pin(async move { self.apply(document_id, patch) })
    }

    fn subscribe<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Subscription, StoreError>> {
        Box::pin(async move {
            let rx = self.channel(document_id).subscribe();
            let doc_id = document_id.to_string();
            let events = stream::unfold((rx, doc_id), |(mut rx, doc_id)| async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => return Some((event, (rx, doc_id))),
                        Err(RecvError::Lagged(n)) => {
                            warn!("Subscriber for {} lagged behind by {} events", doc_id, n);
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            });
            Ok(events.boxed())
        })
    }
}
