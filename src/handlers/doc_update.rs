use axum::{extract::{Path, State}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{Document, DocumentPatch, ErrorResponse};
use crate::store::{DocumentStore, MemoryStore};

/// Apply a partial update and push it to every subscriber
pub async fn doc_update(
    State(store): State<Arc<MemoryStore>>,
    Path(doc_id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> Result<(StatusCode, Json<Document>), (StatusCode, Json<ErrorResponse>)> {
    if patch.is_empty() {
        return Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            format!("Empty update for document '{}'", doc_id),
        ));
    }

    match store.update(&doc_id, patch).await {
        Ok(document) => {
            info!("Updated document {}", doc_id);
            Ok((StatusCode::OK, Json(document)))
        }
        Err(e) => {
            error!("Failed to update document '{}': {}", doc_id, e);
            Err(e.into())
        }
    }
}
