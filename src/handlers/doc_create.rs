use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{CreateDocumentRequest, Document, ErrorResponse};
use crate::store::MemoryStore;

/// Create a document, optionally with a caller-chosen id
pub async fn doc_create(
    State(store): State<Arc<MemoryStore>>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), (StatusCode, Json<ErrorResponse>)> {
    if request.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, "Document id cannot be empty"));
    }

    match store.try_create(request.id, request.content, request.presence) {
        Ok(document) => {
            info!("Created document {} (presence: {})", document.id, document.supports_presence());
            Ok((StatusCode::CREATED, Json(document)))
        }
        Err(e) => {
            error!("Failed to create document: {}", e);
            Err(e.into())
        }
    }
}
