pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;

pub use config::{Config, ConfigError};
pub use models::{ControlMessage, CursorRange, Document, DocumentPatch, Presence, PresenceTable, StoreEvent};
pub use store::{DocumentStore, MemoryStore, RemoteStore, StoreError};
pub use sync::{SessionCallbacks, SessionHandle, SessionOptions, SyncEngine, SyncSettings};
