use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::content::ContentSynchronizer;
use super::multiplexer::{self, ControlAction, UpdateEvent};
use super::presence::PresenceTracker;
use super::registry::{CleanupFn, SessionRegistry};
use super::SyncSettings;
use crate::config::Config;
use crate::models::{ControlMessage, CursorRange, Presence, PresenceTable, StoreEvent};
use crate::store::{DocumentStore, MemoryStore, RemoteStore, StoreError, Subscription};

pub type ContentCallback = Arc<dyn Fn(String) + Send + Sync>;
pub type PresenceCallback = Arc<dyn Fn(PresenceTable) + Send + Sync>;
pub type RevokedCallback = Arc<dyn Fn() + Send + Sync>;

/// Identity and starting point of a collaboration session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub document_id: String,
    pub user_id: String,
    pub user_name: String,
    /// Used when the persisted snapshot cannot be fetched.
    pub initial_content: String,
}

/// Hooks into the UI layer. Invoked from the session's listener task.
#[derive(Clone)]
pub struct SessionCallbacks {
    on_content_change: ContentCallback,
    on_presence_change: Option<PresenceCallback>,
    on_access_revoked: Option<RevokedCallback>,
}

impl SessionCallbacks {
    pub fn new(on_content_change: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            on_content_change: Arc::new(on_content_change),
            on_presence_change: None,
            on_access_revoked: None,
        }
    }

    pub fn on_presence_change(mut self, f: impl Fn(PresenceTable) + Send + Sync + 'static) -> Self {
        self.on_presence_change = Some(Arc::new(f));
        self
    }

    /// Terminal action taken when the local user is removed from the
    /// document, typically a full reload of the hosting application.
    pub fn on_access_revoked(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_access_revoked = Some(Arc::new(f));
        self
    }
}

struct SessionShared {
    session_id: Uuid,
    document_id: String,
    user_id: String,
    store: Arc<dyn DocumentStore>,
    content: ContentSynchronizer,
    presence: PresenceTracker,
    callbacks: SessionCallbacks,
    presence_idle: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
    live: AtomicBool,
    closed: AtomicBool,
}

impl SessionShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn dispatch(&self, event: StoreEvent) {
        if !event.is_update() || event.payload.id != self.document_id {
            trace!("Ignoring event {:?} on document {}", event.events, self.document_id);
            return;
        }

        for update in multiplexer::classify(event) {
            match update {
                UpdateEvent::ControlSignal(message) => self.handle_control(&message),
                UpdateEvent::ContentUpdate(content) => {
                    if self.content.apply_remote(&content) {
                        debug!("Received remote content for document {}", self.document_id);
                        (self.callbacks.on_content_change)(content);
                    }
                }
                UpdateEvent::PresenceUpdate(table) => {
                    if let Some(table) = self.presence.apply_remote(table) {
                        if let Some(on_presence_change) = &self.callbacks.on_presence_change {
                            on_presence_change(table);
                        }
                    }
                }
            }
        }
    }

    fn handle_control(&self, message: &ControlMessage) {
        match multiplexer::route(message, &self.user_id) {
            ControlAction::ForceReload => {
                warn!("User {} was removed from document {}", self.user_id, self.document_id);
                match &self.callbacks.on_access_revoked {
                    Some(on_access_revoked) => on_access_revoked(),
                    None => error!("No reload handler for revoked session on document {}", self.document_id),
                }
            }
            ControlAction::Drop => trace!("Dropped control message {:?}", message),
        }
    }

    async fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Cleaning up collaboration for document: {}", self.document_id);

        if self.content.cancel() {
            debug!("Dropped pending content flush for document {}", self.document_id);
        }
        self.presence.depart().await;

        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.abort();
        }
        self.live.store(false, Ordering::SeqCst);
    }
}

async fn listen(shared: Arc<SessionShared>, mut events: Subscription) {
    while let Some(event) = events.next().await {
        if shared.is_closed() {
            break;
        }
        shared.dispatch(event);
    }
    shared.live.store(false, Ordering::SeqCst);
    debug!("Subscription for document {} ended", shared.document_id);
}

/// Opens collaboration sessions against a document store.
pub struct SyncEngine {
    store: Arc<dyn DocumentStore>,
    registry: SessionRegistry,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn DocumentStore>, settings: SyncSettings) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            settings,
        }
    }

    /// Talks to `config.store_url` when set, otherwise to a private in-memory store.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = match config.store_url.as_deref() {
            Some(url) => {
                info!("Using remote document store at {}", url);
                Arc::new(RemoteStore::new(url)?)
            }
            None => {
                warn!("No STORE_URL configured - sessions will use an in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::new(store, config.sync_settings()))
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Binds `options.document_id` to a live session.
    ///
    /// Any session already open for the document is cleaned up first. A
    /// failed fetch falls back to `initial_content`; a failed subscribe
    /// leaves the session usable for local editing only. Neither is
    /// reported as an error.
    pub async fn initialize_session(&self, options: SessionOptions, callbacks: SessionCallbacks) -> SessionHandle {
        let SessionOptions {
            document_id,
            user_id,
            user_name,
            initial_content,
        } = options;
        info!("Initializing collaboration for document: {}", document_id);

        self.registry.replace(&document_id).await;

        let (fetched, seed) = match self.store.fetch(&document_id).await {
            Ok(document) => {
                info!("Loaded latest state for document {}", document_id);
                (Some(document.content), document.presence)
            }
            Err(e) => {
                warn!("Failed to load latest state for document {}: {}", document_id, e);
                (None, None)
            }
        };

        let cold_start = fetched.is_some();
        let content = ContentSynchronizer::new(
            document_id.clone(),
            self.store.clone(),
            fetched.unwrap_or(initial_content),
            self.settings.content_delay,
        );
        let presence = PresenceTracker::new(
            document_id.clone(),
            user_id.clone(),
            user_name,
            self.store.clone(),
            seed,
            self.settings.presence_delay,
        );
        if !presence.is_supported() {
            info!("Presence disabled for document {}", document_id);
        }

        let session_id = Uuid::new_v4();
        let shared = Arc::new(SessionShared {
            session_id,
            document_id: document_id.clone(),
            user_id,
            store: self.store.clone(),
            content,
            presence,
            callbacks,
            presence_idle: self.settings.presence_idle,
            listener: Mutex::new(None),
            live: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        if cold_start {
            (shared.callbacks.on_content_change)(shared.content.content());
        }

        match self.store.subscribe(&document_id).await {
            Ok(events) => {
                shared.live.store(true, Ordering::SeqCst);
                let listener = tokio::spawn(listen(shared.clone(), events));
                *shared.listener.lock() = Some(listener);
            }
            Err(e) => error!("Failed to subscribe to document {}: {}", document_id, e),
        }

        shared.presence.announce();

        let target = shared.clone();
        let cleanup: CleanupFn = Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move { target.teardown().await })
        });
        if let Some(displaced) = self.registry.register(&document_id, session_id, cleanup) {
            warn!("Concurrent session for document {} displaced", document_id);
            displaced().await;
        }

        SessionHandle {
            shared,
            registry: self.registry.clone(),
        }
    }

    /// Cleans up every open session.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

/// Caller-facing side of one collaboration session.
///
/// None of these operations fail; problems are logged and the session keeps
/// working from its local state.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    registry: SessionRegistry,
}

impl SessionHandle {
    /// Updates the local copy now and persists it after the debounce delay.
    pub fn save_content(&self, new_content: impl Into<String>) {
        if self.shared.is_closed() {
            warn!("save_content on closed session for document {}", self.shared.document_id);
            return;
        }
        self.shared.content.save(new_content.into());
    }

    pub fn update_presence(&self, cursor: Option<CursorRange>) {
        if self.shared.is_closed() {
            warn!("update_presence on closed session for document {}", self.shared.document_id);
            return;
        }
        self.shared.presence.update(cursor);
    }

    /// Cancels both pending flushes without writing them, clears the local
    /// user's presence and closes the subscription.
    pub async fn cleanup(&self) {
        self.registry.deregister(&self.shared.document_id, self.shared.session_id);
        self.shared.teardown().await;
    }

    pub fn get_content(&self) -> String {
        self.shared.content.content()
    }

    pub fn get_presence(&self) -> PresenceTable {
        self.shared.presence.table()
    }

    /// Collaborators seen within the configured idle window, sorted by name.
    pub fn active_collaborators(&self) -> Vec<Presence> {
        self.shared.presence.active(self.shared.presence_idle)
    }

    /// Sends a control message alongside the unchanged document content.
    pub async fn send_control(&self, message: ControlMessage) {
        let patch = match multiplexer::control_patch(&message) {
            Ok(patch) => patch,
            Err(e) => {
                error!("Failed to encode control message {:?}: {}", message, e);
                return;
            }
        };
        match self.shared.store.update(&self.shared.document_id, patch).await {
            Ok(_) => info!("Sent control message {:?} on document {}", message, self.shared.document_id),
            Err(e) => error!("Failed to send control message on document {}: {}", self.shared.document_id, e),
        }
    }

    pub async fn notify_collaborator_removed(&self, removed_id: impl Into<String>) {
        self.send_control(ControlMessage::collaborator_removed(removed_id)).await;
    }

    pub fn has_pending_save(&self) -> bool {
        self.shared.content.has_pending_flush()
    }

    pub fn supports_presence(&self) -> bool {
        self.shared.presence.is_supported()
    }

    /// True while the push subscription is open.
    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn document_id(&self) -> &str {
        &self.shared.document_id
    }

    pub fn user_id(&self) -> &str {
        &self.shared.user_id
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }
}
