//! Persistent document store seam.
//!
//! The sync engine only ever talks to a [`DocumentStore`]. [`MemoryStore`]
//! keeps everything in-process (and backs the reference server), while
//! [`RemoteStore`] talks to that server over HTTP and a websocket.

pub mod memory;
pub mod remote;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use std::fmt;

use crate::models::{Document, DocumentPatch, StoreEvent};

pub use memory::MemoryStore;
pub use remote::{RemoteStore, WireFormat};

/// Stream of push notifications for one document.
pub type Subscription = BoxStream<'static, StoreEvent>;

pub trait DocumentStore: Send + Sync {
    /// Load the current persisted snapshot.
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Document, StoreError>>;

    /// Apply a partial update. Every successful write is pushed to all
    /// subscribers of the document, the writer included.
    fn update<'a>(&'a self, document_id: &'a str, patch: DocumentPatch) -> BoxFuture<'a, Result<Document, StoreError>>;

    /// Open a push subscription filtered to one document.
    fn subscribe<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<Subscription, StoreError>>;
}

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    AlreadyExists(String),
    Unauthorized(String),
    /// The document's schema has no such field.
    UnknownAttribute(String),
    Transport(String),
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Document '{}' not found", id),
            StoreError::AlreadyExists(id) => write!(f, "Document '{}' already exists", id),
            StoreError::Unauthorized(id) => write!(f, "Access to document '{}' denied", id),
            StoreError::UnknownAttribute(attr) => write!(f, "Unknown attribute '{}'", attr),
            StoreError::Transport(e) => write!(f, "Transport error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StoreError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}
