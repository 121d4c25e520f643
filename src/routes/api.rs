use crate::handlers::{doc_create, doc_get, doc_subscribe, doc_update, health_check, ready_check};
use crate::store::MemoryStore;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(store: Arc<MemoryStore>) -> Router {
    Router::<Arc<MemoryStore>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/documents", post(doc_create))
        .route("/v1/documents/:doc_id", get(doc_get).patch(doc_update))
        .route("/v1/documents/:doc_id/subscribe", get(doc_subscribe))
        .with_state(store)
}
