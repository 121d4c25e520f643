use axum::{extract::{Path, State}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{Document, ErrorResponse};
use crate::store::{DocumentStore, MemoryStore};

/// Fetch the current snapshot of a document
pub async fn doc_get(
    State(store): State<Arc<MemoryStore>>,
    Path(doc_id): Path<String>,
) -> Result<(StatusCode, Json<Document>), (StatusCode, Json<ErrorResponse>)> {
    match store.fetch(&doc_id).await {
        Ok(document) => {
            info!("Serving document {}", doc_id);
            Ok((StatusCode::OK, Json(document)))
        }
        Err(e) => {
            error!("Error loading document '{}': {}", doc_id, e);
            Err(e.into())
        }
    }
}
