use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::debug;

use crate::models::{HealthResponse, ReadyResponse};
use crate::store::MemoryStore;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Document store is running".to_string(),
    })
}

/// Readiness check: the store lock is reachable and reports its size
pub async fn ready_check(State(store): State<Arc<MemoryStore>>) -> Json<ReadyResponse> {
    let documents = store.document_count();
    let subscribers = store.total_subscribers();
    debug!("Readiness check: {} documents, {} subscribers", documents, subscribers);
    Json(ReadyResponse {
        status: "ok".to_string(),
        documents,
        subscribers,
    })
}
