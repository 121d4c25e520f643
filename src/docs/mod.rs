use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Store is ready; reports document and subscriber counts", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Create a document
#[utoipa::path(
    post,
    path = "/api/v1/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = Document),
        (status = 409, description = "Document id already taken", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn doc_create_doc() {}

/// Fetch a document snapshot
#[utoipa::path(
    get,
    path = "/api/v1/documents/{doc_id}",
    params(
        ("doc_id" = String, Path, description = "Document id")
    ),
    responses(
        (status = 200, description = "Current document state", body = Document),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn doc_get_doc() {}

/// Apply a partial update; subscribers receive it as a store event
#[utoipa::path(
    patch,
    path = "/api/v1/documents/{doc_id}",
    params(
        ("doc_id" = String, Path, description = "Document id")
    ),
    request_body = DocumentPatch,
    responses(
        (status = 200, description = "Updated document state", body = Document),
        (status = 400, description = "Empty update", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 422, description = "Document has no presence attribute", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn doc_update_doc() {}

/// Websocket stream of store events for a document
#[utoipa::path(
    get,
    path = "/api/v1/documents/{doc_id}/subscribe",
    params(
        ("doc_id" = String, Path, description = "Document id"),
        ("format" = Option<String>, Query, description = "Frame format: json (text frames, default) or cbor (binary frames)")
    ),
    responses(
        (status = 101, description = "Switching to websocket; each frame is a StoreEvent", body = StoreEvent),
        (status = 400, description = "Unknown frame format", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn doc_subscribe_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        doc_create_doc,
        doc_get_doc,
        doc_update_doc,
        doc_subscribe_doc,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            ErrorResponse,
            Document,
            DocumentPatch,
            StoreEvent,
            CreateDocumentRequest,
            PresenceTable,
            Presence,
            CursorRange,
        )
    ),
    tags(
        (name = "api", description = "Document store endpoints")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_document_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/documents/{doc_id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/documents/{doc_id}/subscribe"));
    }
}
